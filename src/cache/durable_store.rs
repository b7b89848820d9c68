//! Almacén durable (L2)
//!
//! Operaciones clave-valor que necesita el cache de productos y el control de
//! versiones. `RedisClient` es la implementación de producción; `MemoryStore`
//! vive en proceso y respalda los tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::utils::errors::{AppError, AppResult};

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// `None` si la clave no existe
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Guarda un valor; `ttl = None` significa sin expiración
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Elimina varias claves en una sola ida y vuelta. Devuelve cuántas existían.
    async fn delete_many(&self, keys: &[String]) -> AppResult<usize>;

    /// Enumera claves que calzan con un patrón glob (`prefix:*`)
    async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>>;

    /// Escribe varias claves sin TTL de forma atómica
    async fn set_many_atomic(&self, entries: &[(String, String)]) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;

    /// Estadísticas del servidor para el health check
    async fn stats(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

/// Almacén en memoria con TTL y simulación de caída
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
    unavailable: AtomicBool,
    round_trips: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simula que el almacén deja de responder
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Número de llamadas recibidas (una por ida y vuelta)
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires)| expires.map_or(true, |e| e > now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> AppResult<()> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::CacheUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn glob_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => pattern == key,
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check()?;
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, expires)| match expires {
            Some(at) if *at <= Instant::now() => None,
            _ => Some(value.clone()),
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.check()?;
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<usize> {
        self.check()?;
        let mut entries = self.entries.write().await;
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(_, (_, expires))| expires.map_or(true, |e| e > now))
            .filter(|(key, _)| glob_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn set_many_atomic(&self, items: &[(String, String)]) -> AppResult<()> {
        self.check()?;
        let mut entries = self.entries.write().await;
        for (key, value) in items {
            entries.insert(key.clone(), (value.clone(), None));
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_only_matches_prefix() {
        let store = MemoryStore::new();
        store.set("product:1", "a", None).await.unwrap();
        store.set("product:2", "b", None).await.unwrap();
        store.set("productos:global_version", "v", None).await.unwrap();

        let mut keys = store.scan_keys("product:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["product:1", "product:2"]);
    }

    #[tokio::test]
    async fn test_ttl_expires_entries() {
        let store = MemoryStore::new();
        store
            .set("product:1", "a", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("product:1").await.unwrap(), None);
        assert!(store.scan_keys("product:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.get("x").await,
            Err(AppError::CacheUnavailable(_))
        ));
        store.set_available(true);
        assert!(store.get("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_many_counts_existing() {
        let store = MemoryStore::new();
        store.set("product:1", "a", None).await.unwrap();
        let removed = store
            .delete_many(&["product:1".to_string(), "product:9".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
