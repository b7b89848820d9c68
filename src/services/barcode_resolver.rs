//! Resolución de códigos de barras para el POS

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::invalidation_coordinator::InvalidationCoordinator;
use crate::cache::ProductCache;
use crate::models::{ProductoCompleto, VersionDomain};
use crate::repositories::ProductRepository;
use crate::utils::errors::{not_found_error, AppResult};

#[derive(Debug, Clone)]
pub struct Resolution {
    pub producto: ProductoCompleto,
    pub cache_hit: bool,
    pub latency: Duration,
}

pub struct BarcodeResolver {
    cache: Arc<ProductCache>,
    repository: Arc<dyn ProductRepository>,
    coordinator: Arc<InvalidationCoordinator>,
}

impl BarcodeResolver {
    pub fn new(
        cache: Arc<ProductCache>,
        repository: Arc<dyn ProductRepository>,
        coordinator: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            cache,
            repository,
            coordinator,
        }
    }

    pub async fn resolve(&self, codigo_barras: &str) -> AppResult<Resolution> {
        let start = Instant::now();

        // Los errores de versión no bloquean la venta
        let (productos, precios) = tokio::join!(
            self.coordinator.validate(VersionDomain::Productos),
            self.coordinator.validate(VersionDomain::ListaPrecios),
        );
        if let Err(e) = productos {
            warn!(error = %e, "⚠️ Error verificando versión de productos");
        }
        if let Err(e) = precios {
            warn!(error = %e, "⚠️ Error verificando versión de lista de precios");
        }

        if let Some(producto) = self.cache.get(codigo_barras).await {
            return Ok(Resolution {
                producto,
                cache_hit: true,
                latency: start.elapsed(),
            });
        }

        // Generación previa a la lectura: si un vaciado ocurre mientras se
        // consulta la BD, el registro leído no vuelve a la cache
        let generation = self.cache.generation();
        let producto = self
            .repository
            .get_record_by_code(codigo_barras)
            .await?
            .ok_or_else(|| not_found_error("Producto", codigo_barras))?;

        match self
            .cache
            .set_if_current(codigo_barras, &producto, generation)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(codigo_barras = %codigo_barras, "Cache invalidada durante la lectura, no se guarda");
            }
            Err(e) => {
                warn!(codigo_barras = %codigo_barras, error = %e, "⚠️ Error guardando producto en cache");
            }
        }

        debug!(
            codigo_barras = %codigo_barras,
            latency = ?start.elapsed(),
            "Producto resuelto desde la BD"
        );

        Ok(Resolution {
            producto,
            cache_hit: false,
            latency: start.elapsed(),
        })
    }
}
