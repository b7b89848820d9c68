//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::cache::{CacheConfig, DurableStore, ProductCache, VersionOracle};
use crate::config::environment::EnvironmentConfig;
use crate::models::VersionDomain;
use crate::repositories::ProductRepository;
use crate::services::{BarcodeResolver, InvalidationCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub cache_config: CacheConfig,
    pub store: Arc<dyn DurableStore>,
    pub repository: Arc<dyn ProductRepository>,
    pub cache: Arc<ProductCache>,
    pub coordinator: Arc<InvalidationCoordinator>,
    pub resolver: Arc<BarcodeResolver>,
}

impl AppState {
    /// Arma el grafo de componentes sobre un almacén y un repositorio
    pub fn new(
        config: EnvironmentConfig,
        cache_config: CacheConfig,
        store: Arc<dyn DurableStore>,
        repository: Arc<dyn ProductRepository>,
    ) -> Self {
        let cache = Arc::new(ProductCache::new(
            store.clone(),
            cache_config.max_l1_entries,
            cache_config.product_ttl(),
        ));

        let coordinator = Arc::new(InvalidationCoordinator::new(
            cache.clone(),
            repository.clone(),
            VersionOracle::new(
                VersionDomain::Productos,
                store.clone(),
                cache_config.check_interval(),
            ),
            VersionOracle::new(
                VersionDomain::ListaPrecios,
                store.clone(),
                cache_config.check_interval(),
            ),
        ));

        let resolver = Arc::new(BarcodeResolver::new(
            cache.clone(),
            repository.clone(),
            coordinator.clone(),
        ));

        Self {
            config,
            cache_config,
            store,
            repository,
            cache,
            coordinator,
            resolver,
        }
    }
}
