//! Coordinador de invalidación por versión
//!
//! En cada lookup decide, por dominio, si hay que consultar la versión en la
//! BD y, si cambió, vaciar el namespace de productos antes de fijar la nueva.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{ProductCache, VersionOracle};
use crate::models::version::{is_regression, version_string};
use crate::models::VersionDomain;
use crate::repositories::ProductRepository;
use crate::utils::errors::{AppError, AppResult};

/// Resultado de una verificación forzada
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotifyOutcome {
    pub version: Option<String>,
    pub invalidated: bool,
}

/// Estado de versión de un dominio para diagnóstico
#[derive(Debug, Clone, Serialize)]
pub struct DomainVersionStatus {
    pub domain: VersionDomain,
    pub version: String,
    pub should_check: bool,
    pub check_interval_seconds: u64,
}

pub struct InvalidationCoordinator {
    cache: Arc<ProductCache>,
    repository: Arc<dyn ProductRepository>,
    productos: VersionOracle,
    lista_precios: VersionOracle,
}

impl InvalidationCoordinator {
    pub fn new(
        cache: Arc<ProductCache>,
        repository: Arc<dyn ProductRepository>,
        productos: VersionOracle,
        lista_precios: VersionOracle,
    ) -> Self {
        Self {
            cache,
            repository,
            productos,
            lista_precios,
        }
    }

    pub fn oracle(&self, domain: VersionDomain) -> &VersionOracle {
        match domain {
            VersionDomain::Productos => &self.productos,
            VersionDomain::ListaPrecios => &self.lista_precios,
        }
    }

    /// Pasada del camino caliente. Respeta el throttle del oráculo.
    pub async fn validate(&self, domain: VersionDomain) -> AppResult<()> {
        let oracle = self.oracle(domain);

        // 1. Versión vigente
        let current = oracle.get_version().await?;

        // 2. Primera vez: fijar la versión sin vaciar nada
        if current.is_empty() {
            if let Some(version) = self.probe(domain).await? {
                oracle.set_version(&version).await?;
                info!(domain = %domain, version = %version, "📌 Versión inicial registrada");
            }
            return Ok(());
        }

        // 3. Throttle
        if !oracle.should_check_authoritative().await? {
            return Ok(());
        }

        // 4. Consultar la BD
        self.reconcile(domain, &current).await.map(|_| ())
    }

    /// Verificación incondicional (endpoint de notificación)
    pub async fn force_check(&self, domain: VersionDomain) -> AppResult<NotifyOutcome> {
        let current = self.oracle(domain).get_version().await?;
        self.reconcile(domain, &current).await
    }

    pub async fn status(&self, domain: VersionDomain) -> AppResult<DomainVersionStatus> {
        let oracle = self.oracle(domain);
        Ok(DomainVersionStatus {
            domain,
            version: oracle.get_version().await?,
            should_check: oracle.should_check_authoritative().await?,
            check_interval_seconds: oracle.check_interval().as_secs(),
        })
    }

    /// Paso 4: consulta la BD, reinicia el throttle y vacía si cambió la versión
    async fn reconcile(&self, domain: VersionDomain, current: &str) -> AppResult<NotifyOutcome> {
        let oracle = self.oracle(domain);
        let probed = self.probe(domain).await?;
        oracle.touch_last_checked().await?;

        let Some(version) = probed else {
            debug!(domain = %domain, "Sin timestamp en la BD, nada que comparar");
            return Ok(NotifyOutcome {
                version: None,
                invalidated: false,
            });
        };

        if version == current {
            return Ok(NotifyOutcome {
                version: Some(version),
                invalidated: false,
            });
        }

        if is_regression(current, &version) {
            warn!(
                domain = %domain,
                version_actual = %current,
                version_bd = %version,
                "⚠️ La versión de la BD es anterior a la registrada, se ignora"
            );
            return Ok(NotifyOutcome {
                version: Some(current.to_string()),
                invalidated: false,
            });
        }

        info!(
            domain = %domain,
            version_anterior = %current,
            version_nueva = %version,
            "🔄 Versión global cambió, invalidando cache"
        );
        self.cache.invalidate_all().await?;
        oracle.set_version(&version).await?;

        Ok(NotifyOutcome {
            version: Some(version),
            invalidated: true,
        })
    }

    async fn probe(&self, domain: VersionDomain) -> AppResult<Option<String>> {
        let latest = self
            .repository
            .get_latest_version(domain)
            .await
            .map_err(|e| AppError::VersionCheckFailed(format!("{}: {}", domain, e)))?;
        Ok(latest.as_ref().map(version_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DurableStore, MemoryStore};
    use crate::models::producto::fixtures::producto;
    use crate::repositories::InMemoryProductRepository;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        repo: Arc<InMemoryProductRepository>,
        cache: Arc<ProductCache>,
        coordinator: InvalidationCoordinator,
    }

    fn harness(interval: Duration) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(InMemoryProductRepository::new());
        let cache = Arc::new(ProductCache::new(store.clone(), 100, Duration::from_secs(3600)));
        let coordinator = InvalidationCoordinator::new(
            cache.clone(),
            repo.clone(),
            VersionOracle::new(VersionDomain::Productos, store.clone(), interval),
            VersionOracle::new(VersionDomain::ListaPrecios, store.clone(), interval),
        );
        Harness {
            store,
            repo,
            cache,
            coordinator,
        }
    }

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_notify_price_list_update_scenario() {
        let h = harness(Duration::from_secs(10));
        h.store
            .set("lista_precios:global_version", "2024-01-01T00:00:00Z", None)
            .await
            .unwrap();
        h.repo.set_version(VersionDomain::ListaPrecios, day(2)).await;
        for code in ["1", "2", "3"] {
            h.cache.set(code, &producto("P", code)).await.unwrap();
        }

        let outcome = h.coordinator.force_check(VersionDomain::ListaPrecios).await.unwrap();
        assert_eq!(
            outcome,
            NotifyOutcome {
                version: Some("2024-01-02T00:00:00Z".to_string()),
                invalidated: true
            }
        );
        assert_eq!(h.cache.l1_len().await, 0);
        assert!(h.store.scan_keys("product:*").await.unwrap().is_empty());
        assert_eq!(
            h.store.get("lista_precios:global_version").await.unwrap().as_deref(),
            Some("2024-01-02T00:00:00Z")
        );

        // Repetir sin cambios: idempotente
        h.cache.set("1", &producto("P", "1")).await.unwrap();
        let again = h.coordinator.force_check(VersionDomain::ListaPrecios).await.unwrap();
        assert!(!again.invalidated);
        assert_eq!(again.version.as_deref(), Some("2024-01-02T00:00:00Z"));
        assert_eq!(h.cache.l1_len().await, 1);
    }

    #[tokio::test]
    async fn test_first_probe_sets_version_without_flush() {
        let h = harness(Duration::from_secs(10));
        h.repo.set_version(VersionDomain::Productos, day(1)).await;
        h.cache.set("1", &producto("P", "1")).await.unwrap();

        h.coordinator.validate(VersionDomain::Productos).await.unwrap();

        assert_eq!(h.cache.l1_len().await, 1);
        assert_eq!(
            h.coordinator.oracle(VersionDomain::Productos).get_version().await.unwrap(),
            "2024-01-01T00:00:00Z"
        );
    }

    #[tokio::test]
    async fn test_throttle_limits_probes() {
        let h = harness(Duration::from_secs(3600));
        h.repo.set_version(VersionDomain::Productos, day(1)).await;

        for _ in 0..50 {
            h.coordinator.validate(VersionDomain::Productos).await.unwrap();
        }
        // Solo la primera pasada consulta la BD
        assert_eq!(h.repo.version_queries(), 1);
    }

    #[tokio::test]
    async fn test_validate_flushes_on_change_after_interval() {
        let h = harness(Duration::ZERO);
        h.repo.set_version(VersionDomain::Productos, day(1)).await;
        h.coordinator.validate(VersionDomain::Productos).await.unwrap();

        h.cache.set("1", &producto("P", "1")).await.unwrap();
        h.repo.set_version(VersionDomain::Productos, day(3)).await;
        h.coordinator.validate(VersionDomain::Productos).await.unwrap();

        assert_eq!(h.cache.l1_len().await, 0);
        assert_eq!(
            h.coordinator.oracle(VersionDomain::Productos).get_version().await.unwrap(),
            "2024-01-03T00:00:00Z"
        );
    }

    #[tokio::test]
    async fn test_domains_do_not_share_state() {
        let h = harness(Duration::from_secs(10));
        h.repo.set_version(VersionDomain::ListaPrecios, day(2)).await;

        h.coordinator.force_check(VersionDomain::ListaPrecios).await.unwrap();

        let productos = h.coordinator.status(VersionDomain::Productos).await.unwrap();
        assert_eq!(productos.version, "");
        assert!(productos.should_check);
    }

    #[tokio::test]
    async fn test_regression_is_not_committed() {
        let h = harness(Duration::from_secs(10));
        h.store
            .set("productos:global_version", "2024-01-05T00:00:00Z", None)
            .await
            .unwrap();
        h.cache.set("1", &producto("P", "1")).await.unwrap();
        h.repo.set_version(VersionDomain::Productos, day(2)).await;

        let outcome = h.coordinator.force_check(VersionDomain::Productos).await.unwrap();
        assert!(!outcome.invalidated);
        assert_eq!(outcome.version.as_deref(), Some("2024-01-05T00:00:00Z"));
        assert_eq!(h.cache.l1_len().await, 1);
        assert!(!h
            .coordinator
            .oracle(VersionDomain::Productos)
            .should_check_authoritative()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_empty_authoritative_store() {
        let h = harness(Duration::from_secs(10));
        let outcome = h.coordinator.force_check(VersionDomain::ListaPrecios).await.unwrap();
        assert_eq!(
            outcome,
            NotifyOutcome {
                version: None,
                invalidated: false
            }
        );
    }

    #[tokio::test]
    async fn test_probe_failure_is_version_check_failed() {
        let h = harness(Duration::from_secs(10));
        h.repo.set_failing(true);
        let err = h.coordinator.force_check(VersionDomain::Productos).await.unwrap_err();
        assert!(matches!(err, AppError::VersionCheckFailed(_)));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_validation() {
        let h = harness(Duration::from_secs(10));
        h.repo.set_version(VersionDomain::Productos, day(1)).await;
        h.store.set_available(false);
        let err = h.coordinator.validate(VersionDomain::Productos).await.unwrap_err();
        assert!(matches!(err, AppError::CacheUnavailable(_)));
        assert_eq!(h.repo.version_queries(), 0);
    }
}
