use std::sync::Arc;
use validator::Validate;

use crate::cache::{CacheStatsSnapshot, InvalidationSummary, ProductCache};
use crate::dto::pos_dto::{
    ApiResponse, CacheVersionResponse, CodigosBarrasRequest, InvalidationResponse,
    PreloadFrecuentesQuery, PreloadResponse, ProductoLookupResponse,
};
use crate::models::{ProductoPOSResponse, VersionDomain};
use crate::repositories::ProductRepository;
use crate::services::{BarcodeResolver, InvalidationCoordinator, NotifyOutcome};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError};

pub struct PosController {
    cache: Arc<ProductCache>,
    repository: Arc<dyn ProductRepository>,
    coordinator: Arc<InvalidationCoordinator>,
    resolver: Arc<BarcodeResolver>,
}

impl PosController {
    pub fn new(state: &AppState) -> Self {
        Self {
            cache: state.cache.clone(),
            repository: state.repository.clone(),
            coordinator: state.coordinator.clone(),
            resolver: state.resolver.clone(),
        }
    }

    pub async fn lookup(&self, codigo: &str) -> Result<ApiResponse<ProductoLookupResponse>, AppError> {
        let codigo = require_code(codigo, "Código de barras requerido")?;
        let resolution = self.resolver.resolve(codigo).await?;

        log::debug!(
            "🔍 Producto {} resuelto (cache_hit: {}, {:?})",
            codigo,
            resolution.cache_hit,
            resolution.latency
        );

        Ok(ApiResponse::success_with_message(
            ProductoLookupResponse {
                producto: resolution.producto,
                cache_hit: resolution.cache_hit,
                latency_ms: resolution.latency.as_secs_f64() * 1000.0,
            },
            "✅ Producto encontrado".to_string(),
        ))
    }

    pub async fn lookup_pos(&self, codigo: &str) -> Result<ApiResponse<ProductoPOSResponse>, AppError> {
        let codigo = require_code(codigo, "Código de barras requerido")?;
        let resolution = self.resolver.resolve(codigo).await?;
        Ok(ApiResponse::success(resolution.producto.to_pos_response()))
    }

    /// Resuelve cada código para calentar el cache
    pub async fn preload(&self, request: CodigosBarrasRequest) -> Result<ApiResponse<PreloadResponse>, AppError> {
        request.validate()?;
        log::info!("📦 Pre-cargando {} productos", request.codigos_barras.len());

        let mut encontrados = 0;
        let mut no_encontrados = Vec::new();
        let mut errores = 0;

        for codigo in &request.codigos_barras {
            match self.resolver.resolve(codigo).await {
                Ok(_) => encontrados += 1,
                Err(AppError::NotFound(_)) => no_encontrados.push(codigo.clone()),
                Err(e) => {
                    log::warn!("⚠️ Error pre-cargando {}: {}", codigo, e);
                    errores += 1;
                }
            }
        }

        Ok(ApiResponse::success_with_message(
            PreloadResponse {
                solicitados: request.codigos_barras.len(),
                encontrados,
                no_encontrados,
                errores,
                cache_stats: self.cache.stats().await,
            },
            "✅ Productos pre-cargados correctamente".to_string(),
        ))
    }

    /// Carga en el cache los productos activos más comunes
    pub async fn preload_frecuentes(&self, query: PreloadFrecuentesQuery) -> Result<ApiResponse<PreloadResponse>, AppError> {
        query.validate()?;
        let generation = self.cache.generation();
        let productos = self.repository.get_frequent_products(query.limit()).await?;
        log::info!("📦 Pre-cargando {} productos frecuentes", productos.len());

        let mut encontrados = 0;
        let mut no_encontrados = Vec::new();
        let mut errores = 0;

        for producto in &productos {
            let codigo_barras = producto
                .codigo_barra_externo
                .as_deref()
                .or(producto.codigo_barra_interno.as_deref())
                .filter(|c| !c.is_empty());

            let Some(codigo_barras) = codigo_barras else {
                no_encontrados.push(producto.codigo.clone());
                continue;
            };

            match self.cache.set_if_current(codigo_barras, producto, generation).await {
                Ok(true) => encontrados += 1,
                // La cache se vació mientras se leía la BD: la lectura quedó obsoleta
                Ok(false) => {
                    log::warn!("⚠️ Cache invalidada durante la pre-carga, se descarta el resto");
                    break;
                }
                Err(e) => {
                    log::warn!("⚠️ Error cacheando {}: {}", codigo_barras, e);
                    errores += 1;
                }
            }
        }

        Ok(ApiResponse::success_with_message(
            PreloadResponse {
                solicitados: productos.len(),
                encontrados,
                no_encontrados,
                errores,
                cache_stats: self.cache.stats().await,
            },
            "✅ Productos frecuentes pre-cargados".to_string(),
        ))
    }

    pub async fn cache_stats(&self) -> ApiResponse<CacheStatsSnapshot> {
        ApiResponse::success_with_message(
            self.cache.stats().await,
            "✅ Estadísticas del caché".to_string(),
        )
    }

    pub async fn invalidate_product(&self, codigo: &str) -> Result<ApiResponse<InvalidationResponse>, AppError> {
        let codigo = require_code(codigo, "Código de barras requerido")?;
        log::info!("🗑️ Invalidando cache de producto {}", codigo);

        self.cache.invalidate(codigo).await?;
        Ok(ApiResponse::success_with_message(
            InvalidationResponse { invalidados: 1 },
            "✅ Cache invalidada correctamente".to_string(),
        ))
    }

    pub async fn invalidate_by_codigo_tivendo(&self, codigo: &str) -> Result<ApiResponse<InvalidationResponse>, AppError> {
        let codigo = require_code(codigo, "Código Tivendo requerido")?;
        log::info!("🗑️ Invalidando cache por código Tivendo {}", codigo);

        let invalidados = self.cache.invalidate_by_catalog_code(codigo).await?;
        Ok(ApiResponse::success_with_message(
            InvalidationResponse { invalidados },
            "✅ Cache invalidada correctamente".to_string(),
        ))
    }

    pub async fn invalidate_all(&self) -> Result<ApiResponse<InvalidationSummary>, AppError> {
        log::info!("🧹 Invalidando toda la cache de productos");

        let summary = self.cache.invalidate_all().await?;
        Ok(ApiResponse::success_with_message(
            summary,
            "✅ Cache invalidada completamente".to_string(),
        ))
    }

    pub async fn invalidate_batch(&self, request: CodigosBarrasRequest) -> Result<ApiResponse<InvalidationResponse>, AppError> {
        if request.codigos_barras.is_empty() {
            return Err(bad_request_error("codigos_barras no puede estar vacío"));
        }
        request.validate()?;
        log::info!("🗑️ Invalidando cache de {} productos", request.codigos_barras.len());

        let invalidados = self.cache.invalidate_many(&request.codigos_barras).await?;
        Ok(ApiResponse::success_with_message(
            InvalidationResponse { invalidados },
            "✅ Cache invalidada correctamente".to_string(),
        ))
    }

    /// Llamado por el proceso que hace la actualización masiva
    pub async fn notify_update(&self, domain: VersionDomain) -> Result<ApiResponse<NotifyOutcome>, AppError> {
        log::info!("📣 Notificación de actualización masiva: {}", domain);

        let outcome = self.coordinator.force_check(domain).await?;
        let message = if outcome.invalidated {
            format!("✅ Cache invalidada por cambio de versión de {}", domain)
        } else {
            format!("✅ Versión de {} sin cambios", domain)
        };
        Ok(ApiResponse::success_with_message(outcome, message))
    }

    pub async fn cache_version(&self) -> Result<ApiResponse<CacheVersionResponse>, AppError> {
        let (productos, lista_precios) = tokio::try_join!(
            self.coordinator.status(VersionDomain::Productos),
            self.coordinator.status(VersionDomain::ListaPrecios),
        )?;
        Ok(ApiResponse::success(CacheVersionResponse {
            productos,
            lista_precios,
        }))
    }
}

fn require_code<'a>(codigo: &'a str, message: &str) -> Result<&'a str, AppError> {
    let codigo = codigo.trim();
    if codigo.is_empty() {
        return Err(bad_request_error(message));
    }
    Ok(codigo)
}
