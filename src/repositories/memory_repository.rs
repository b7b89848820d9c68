//! Repositorio en memoria para tests y demos sin PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::product_repository::ProductRepository;
use crate::models::{ProductoCompleto, VersionDomain};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
pub struct InMemoryProductRepository {
    records: RwLock<HashMap<String, ProductoCompleto>>,
    versions: RwLock<HashMap<VersionDomain, DateTime<Utc>>>,
    failing: AtomicBool,
    record_queries: AtomicUsize,
    version_queries: AtomicUsize,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un producto bajo un código de barras
    pub async fn insert(&self, code: &str, producto: ProductoCompleto) {
        self.records.write().await.insert(code.to_string(), producto);
    }

    pub async fn remove(&self, code: &str) {
        self.records.write().await.remove(code);
    }

    pub async fn set_version(&self, domain: VersionDomain, version: DateTime<Utc>) {
        self.versions.write().await.insert(domain, version);
    }

    pub async fn clear_version(&self, domain: VersionDomain) {
        self.versions.write().await.remove(&domain);
    }

    /// Simula una caída de la base de datos
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn record_queries(&self) -> usize {
        self.record_queries.load(Ordering::SeqCst)
    }

    pub fn version_queries(&self) -> usize {
        self.version_queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get_latest_version(&self, domain: VersionDomain) -> AppResult<Option<DateTime<Utc>>> {
        self.version_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.versions.read().await.get(&domain).copied())
    }

    async fn get_record_by_code(&self, code: &str) -> AppResult<Option<ProductoCompleto>> {
        self.record_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let records = self.records.read().await;
        if let Some(producto) = records.get(code) {
            return Ok(Some(producto.clone()));
        }
        // Igual que la query de packs: también se busca por código de pack
        Ok(records
            .values()
            .find(|p| p.es_pack() && p.codigo_pack.as_deref() == Some(code))
            .cloned())
    }

    async fn get_frequent_products(&self, limit: i64) -> AppResult<Vec<ProductoCompleto>> {
        self.check()?;
        let mut productos: Vec<ProductoCompleto> = self
            .records
            .read()
            .await
            .values()
            .filter(|p| !p.es_pack())
            .filter(|p| p.activo.unwrap_or(false) && p.disponible_para_venta.unwrap_or(false))
            .cloned()
            .collect();
        productos.sort_by(|a, b| a.nombre.cmp(&b.nombre));
        productos.truncate(limit.max(0) as usize);
        Ok(productos)
    }

    async fn ping(&self) -> AppResult<()> {
        self.check()
    }
}
