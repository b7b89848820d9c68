//! Cache multi-nivel de productos
//!
//! L1: `HashMap` en memoria protegido por un `RwLock`, sin metadata de
//! frescura. L2: almacén durable (Redis) con TTL fijo como red de seguridad.
//! La invalidación por versión vive en `services::invalidation_coordinator`.
//!
//! Cada vaciado total incrementa una generación. Las escrituras en L1 (fill o
//! promoción desde L2) recuerdan la generación con la que empezaron su I/O y
//! se descartan si entre medio hubo un vaciado, así L1 no revive entradas
//! que el vaciado acaba de borrar de L2.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::durable_store::DurableStore;
use crate::models::ProductoCompleto;
use crate::utils::errors::AppResult;

/// Prefijo de todas las entradas de producto en L2
pub const PRODUCT_KEY_PREFIX: &str = "product:";

fn product_key(codigo_barras: &str) -> String {
    format!("{}{}", PRODUCT_KEY_PREFIX, codigo_barras)
}

fn product_pattern() -> String {
    format!("{}*", PRODUCT_KEY_PREFIX)
}

/// Contadores de hits/misses del cache
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Estadísticas del cache
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub total_keys: usize,
    pub max_keys: usize,
    pub hit_rate: f64,
}

/// Resultado de una invalidación total
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct InvalidationSummary {
    pub productos_l1: usize,
    pub productos_l2: usize,
}

/// Cache de productos en dos niveles (memoria + Redis)
pub struct ProductCache {
    l1: RwLock<HashMap<String, ProductoCompleto>>,
    store: Arc<dyn DurableStore>,
    max_l1_size: usize,
    ttl: Duration,
    counters: CacheCounters,
    generation: AtomicU64,
}

impl ProductCache {
    pub fn new(store: Arc<dyn DurableStore>, max_l1_size: usize, ttl: Duration) -> Self {
        Self {
            l1: RwLock::new(HashMap::new()),
            store,
            max_l1_size: max_l1_size.max(1),
            ttl,
            counters: CacheCounters::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Busca un producto: L1, luego L2 (promoviendo a L1). `None` = miss.
    pub async fn get(&self, codigo_barras: &str) -> Option<ProductoCompleto> {
        let start = Instant::now();
        let generation = self.generation();

        // 1. L1 Cache (memoria local)
        if let Some(producto) = self.l1.read().await.get(codigo_barras).cloned() {
            self.counters.record_hit();
            debug!(
                codigo_barras = %codigo_barras,
                latency = ?start.elapsed(),
                "L1 cache hit"
            );
            return Some(producto);
        }

        // 2. L2 Cache (Redis)
        if let Some(producto) = self.get_from_l2(codigo_barras).await {
            self.set_to_l1(codigo_barras, producto.clone(), generation).await;
            self.counters.record_hit();
            debug!(
                codigo_barras = %codigo_barras,
                latency = ?start.elapsed(),
                "L2 cache hit"
            );
            return Some(producto);
        }

        self.counters.record_miss();
        debug!(
            codigo_barras = %codigo_barras,
            latency = ?start.elapsed(),
            "Cache miss"
        );
        None
    }

    /// Generación actual; cambia con cada `invalidate_all`
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Guarda en ambos niveles. El error de L2 se devuelve; L1 queda escrito igual.
    pub async fn set(&self, codigo_barras: &str, producto: &ProductoCompleto) -> AppResult<()> {
        self.set_if_current(codigo_barras, producto, self.generation())
            .await
            .map(|_| ())
    }

    /// Como `set`, pero descarta la escritura si hubo un vaciado total después
    /// de `generation` (el registro se leyó antes del vaciado).
    /// Devuelve `false` si la escritura se descartó.
    pub async fn set_if_current(
        &self,
        codigo_barras: &str,
        producto: &ProductoCompleto,
        generation: u64,
    ) -> AppResult<bool> {
        if self.generation() != generation {
            debug!(codigo_barras = %codigo_barras, "Escritura descartada: cache vaciada durante la lectura");
            return Ok(false);
        }

        let l2 = self.set_to_l2(codigo_barras, producto).await;

        // Un vaciado pudo escanear L2 antes de que llegara nuestra escritura
        if self.generation() != generation {
            if l2.is_ok() {
                if let Err(e) = self.store.delete(&product_key(codigo_barras)).await {
                    warn!(codigo_barras = %codigo_barras, error = %e, "⚠️ No se pudo retirar escritura obsoleta de L2");
                }
            }
            debug!(codigo_barras = %codigo_barras, "Escritura descartada: cache vaciada durante la escritura");
            return Ok(false);
        }

        let written = self.set_to_l1(codigo_barras, producto.clone(), generation).await;
        l2.map(|_| written)
    }

    /// Invalida un producto en ambos niveles
    pub async fn invalidate(&self, codigo_barras: &str) -> AppResult<()> {
        self.l1.write().await.remove(codigo_barras);
        self.store.delete(&product_key(codigo_barras)).await
    }

    /// Invalida varios productos; L2 en una sola llamada pipelined
    pub async fn invalidate_many(&self, codigos_barras: &[String]) -> AppResult<usize> {
        if codigos_barras.is_empty() {
            return Ok(0);
        }

        {
            let mut l1 = self.l1.write().await;
            for codigo in codigos_barras {
                l1.remove(codigo);
            }
        }

        let keys: Vec<String> = codigos_barras.iter().map(|c| product_key(c)).collect();
        match self.store.delete_many(&keys).await {
            Ok(removed) => {
                info!(
                    cantidad = codigos_barras.len(),
                    eliminados_l2 = removed,
                    "🗑️ Productos invalidados en cache"
                );
                Ok(codigos_barras.len())
            }
            Err(e) => {
                error!(
                    cantidad = codigos_barras.len(),
                    error = %e,
                    "❌ Error invalidando productos en Redis"
                );
                Err(e)
            }
        }
    }

    /// Invalida todo el namespace de productos.
    ///
    /// El L1 se reemplaza bajo un lock de escritura breve; el SCAN de L2 corre
    /// sin ningún lock tomado. L1 se vacía de nuevo al terminar para retirar
    /// promociones que leyeron L2 mientras corría el SCAN.
    pub async fn invalidate_all(&self) -> AppResult<InvalidationSummary> {
        let productos_l1 = self.clear_l1().await;

        let keys = match self.store.scan_keys(&product_pattern()).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "❌ Error escaneando Redis para invalidación total");
                return Err(e);
            }
        };

        if !keys.is_empty() {
            if let Err(e) = self.store.delete_many(&keys).await {
                error!(error = %e, "❌ Error eliminando claves de Redis");
                return Err(e);
            }
        }

        let promovidos = self.clear_l1().await;
        if promovidos > 0 {
            debug!(promovidos, "Promociones concurrentes retiradas de L1");
        }

        let summary = InvalidationSummary {
            productos_l1,
            productos_l2: keys.len(),
        };
        info!(
            productos_l1 = summary.productos_l1,
            productos_l2 = summary.productos_l2,
            "🧹 Cache de productos invalidada completamente"
        );
        Ok(summary)
    }

    /// Invalida todas las entradas cuyo código Tivendo (canónico o de pack)
    /// sea `codigo`. Recorre L1 y L2 completos; no es para el camino caliente.
    pub async fn invalidate_by_catalog_code(&self, codigo: &str) -> AppResult<usize> {
        let mut codigos_invalidar: HashSet<String> = {
            let l1 = self.l1.read().await;
            l1.iter()
                .filter(|(_, producto)| producto.matches_catalog_code(codigo))
                .map(|(codigo_barras, _)| codigo_barras.clone())
                .collect()
        };

        match self.store.scan_keys(&product_pattern()).await {
            Ok(keys) => {
                for key in keys {
                    let Some(codigo_barras) = key.strip_prefix(PRODUCT_KEY_PREFIX) else {
                        continue;
                    };
                    if codigos_invalidar.contains(codigo_barras) {
                        continue;
                    }
                    if let Some(producto) = self.get_from_l2(codigo_barras).await {
                        if producto.matches_catalog_code(codigo) {
                            codigos_invalidar.insert(codigo_barras.to_string());
                        }
                    }
                }
            }
            Err(e) => {
                error!(
                    codigo_tivendo = %codigo,
                    error = %e,
                    "❌ Error escaneando Redis para invalidación por código"
                );
            }
        }

        if codigos_invalidar.is_empty() {
            debug!(
                codigo_tivendo = %codigo,
                "No se encontraron productos en cache para código Tivendo"
            );
            return Ok(0);
        }

        let codigos: Vec<String> = codigos_invalidar.into_iter().collect();
        info!(
            codigo_tivendo = %codigo,
            productos_encontrados = codigos.len(),
            "🔄 Invalidando productos por código Tivendo"
        );
        self.invalidate_many(&codigos).await
    }

    /// Snapshot inmutable de las estadísticas
    pub async fn stats(&self) -> CacheStatsSnapshot {
        let (hits, misses) = self.counters.snapshot();
        let total_requests = hits + misses;
        let total_keys = self.l1_len().await;

        CacheStatsSnapshot {
            hits,
            misses,
            total_requests,
            total_keys,
            max_keys: self.max_l1_size,
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                hits as f64 / total_requests as f64
            },
        }
    }

    pub async fn l1_len(&self) -> usize {
        self.l1.read().await.len()
    }

    /// Vacía L1 e incrementa la generación bajo el mismo lock
    async fn clear_l1(&self) -> usize {
        let mut l1 = self.l1.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        std::mem::take(&mut *l1).len()
    }

    async fn set_to_l1(&self, codigo_barras: &str, producto: ProductoCompleto, generation: u64) -> bool {
        let mut l1 = self.l1.write().await;

        if self.generation() != generation {
            return false;
        }

        if !l1.contains_key(codigo_barras) && l1.len() >= self.max_l1_size {
            Self::evict_one(&mut l1);
        }

        l1.insert(codigo_barras.to_string(), producto);
        true
    }

    /// Elimina una entrada cualquiera (sin seguimiento de recencia)
    fn evict_one(l1: &mut HashMap<String, ProductoCompleto>) {
        if let Some(key) = l1.keys().next().cloned() {
            l1.remove(&key);
            debug!(codigo_barras = %key, "L1 eviction");
        }
    }

    /// Lee y decodifica de L2; error de Redis o payload corrupto cuentan como miss
    async fn get_from_l2(&self, codigo_barras: &str) -> Option<ProductoCompleto> {
        let key = product_key(codigo_barras);

        let data = match self.store.get(&key).await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(codigo_barras = %codigo_barras, error = %e, "⚠️ L2 no disponible, se trata como miss");
                return None;
            }
        };

        match serde_json::from_str::<ProductoCompleto>(&data) {
            Ok(producto) => Some(producto),
            Err(e) => {
                warn!(codigo_barras = %codigo_barras, error = %e, "⚠️ Payload corrupto en L2, se trata como miss");
                None
            }
        }
    }

    async fn set_to_l2(&self, codigo_barras: &str, producto: &ProductoCompleto) -> AppResult<()> {
        let data = serde_json::to_string(producto)?;
        self.store
            .set(&product_key(codigo_barras), &data, Some(self.ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::durable_store::MemoryStore;
    use crate::models::producto::fixtures::{pack, producto};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Store que se detiene dentro de `scan_keys` hasta que el test lo libera
    #[derive(Default)]
    struct PausedScanStore {
        inner: MemoryStore,
        scanning: Notify,
        resume: Notify,
    }

    #[async_trait]
    impl DurableStore for PausedScanStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.inner.delete(key).await
        }

        async fn delete_many(&self, keys: &[String]) -> AppResult<usize> {
            self.inner.delete_many(keys).await
        }

        async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>> {
            let keys = self.inner.scan_keys(pattern).await;
            self.scanning.notify_one();
            self.resume.notified().await;
            keys
        }

        async fn set_many_atomic(&self, entries: &[(String, String)]) -> AppResult<()> {
            self.inner.set_many_atomic(entries).await
        }

        async fn ping(&self) -> AppResult<()> {
            self.inner.ping().await
        }
    }

    fn cache_with(store: Arc<MemoryStore>, max: usize) -> ProductCache {
        ProductCache::new(store, max, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 10);
        let p = producto("P100", "7801234567890");

        cache.set("7801234567890", &p).await.unwrap();

        assert_eq!(cache.l1_len().await, 1);
        let raw = store.get("product:7801234567890").await.unwrap().unwrap();
        let decoded: ProductoCompleto = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, p);
    }

    #[tokio::test]
    async fn test_l2_hit_promotes_to_l1() {
        let store = Arc::new(MemoryStore::new());
        let p = producto("P100", "7801234567890");
        store
            .set("product:7801234567890", &serde_json::to_string(&p).unwrap(), None)
            .await
            .unwrap();

        let cache = cache_with(store.clone(), 10);
        assert_eq!(cache.l1_len().await, 0);
        assert_eq!(cache.get("7801234567890").await, Some(p));
        assert_eq!(cache.l1_len().await, 1);

        // Segunda lectura desde L1: sin ida y vuelta a L2
        let before = store.round_trips();
        assert!(cache.get("7801234567890").await.is_some());
        assert_eq!(store.round_trips(), before);
    }

    #[tokio::test]
    async fn test_miss_and_stats() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, 10);
        cache.set("1", &producto("P1", "1")).await.unwrap();

        assert!(cache.get("1").await.is_some());
        assert!(cache.get("2").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_keys, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_l2_unavailable_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 10);
        store.set_available(false);

        assert!(cache.get("7801234567890").await.is_none());
        assert_eq!(cache.stats().await.misses, 1);

        // La escritura falla en L2 pero L1 queda poblado
        assert!(cache.set("1", &producto("P1", "1")).await.is_err());
        assert!(cache.get("1").await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.set("product:1", "{no es json", None).await.unwrap();
        let cache = cache_with(store, 10);

        assert!(cache.get("1").await.is_none());
        assert_eq!(cache.l1_len().await, 0);
    }

    #[tokio::test]
    async fn test_l1_never_exceeds_capacity() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 3);

        for i in 0..20 {
            let code = format!("780{}", i);
            cache.set(&code, &producto("P", &code)).await.unwrap();
            let len = cache.l1_len().await;
            assert!(len <= 3);
            assert!(len >= 1);
        }
        assert_eq!(cache.l1_len().await, 3);
        // L2 conserva todo
        assert_eq!(store.len().await, 20);
    }

    #[tokio::test]
    async fn test_replacing_existing_key_does_not_evict() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, 2);
        cache.set("a", &producto("A", "a")).await.unwrap();
        cache.set("b", &producto("B", "b")).await.unwrap();
        cache.set("b", &producto("B2", "b")).await.unwrap();

        assert_eq!(cache.l1_len().await, 2);
        assert_eq!(cache.get("a").await.unwrap().codigo, "A");
        assert_eq!(cache.get("b").await.unwrap().codigo, "B2");
    }

    #[tokio::test]
    async fn test_invalidate_many_uses_one_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 10);
        for code in ["1", "2", "3"] {
            cache.set(code, &producto("P", code)).await.unwrap();
        }

        let before = store.round_trips();
        let codes = vec!["1".to_string(), "2".to_string()];
        assert_eq!(cache.invalidate_many(&codes).await.unwrap(), 2);
        assert_eq!(store.round_trips(), before + 1);

        assert_eq!(cache.l1_len().await, 1);
        assert!(store.get("product:1").await.unwrap().is_none());
        assert!(store.get("product:3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all_keeps_version_keys() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("lista_precios:global_version", "2024-01-01T00:00:00Z", None)
            .await
            .unwrap();
        let cache = cache_with(store.clone(), 10);
        for code in ["1", "2", "3"] {
            cache.set(code, &producto("P", code)).await.unwrap();
        }

        let summary = cache.invalidate_all().await.unwrap();
        assert_eq!(summary.productos_l1, 3);
        assert_eq!(summary.productos_l2, 3);
        assert_eq!(cache.l1_len().await, 0);
        assert!(store.scan_keys("product:*").await.unwrap().is_empty());
        assert!(store
            .get("lista_precios:global_version")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_invalidate_by_catalog_code() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 10);
        cache
            .set("7801234567890", &producto("P100", "7801234567890"))
            .await
            .unwrap();
        cache
            .set("7809999999999", &pack("P100", "7809999999999", 6))
            .await
            .unwrap();
        cache
            .set("7800000000000", &producto("P200", "7800000000000"))
            .await
            .unwrap();

        // Una entrada sólo en L2 (otra instancia la escribió)
        let remote = producto("P100", "7805555555555");
        store
            .set("product:7805555555555", &serde_json::to_string(&remote).unwrap(), None)
            .await
            .unwrap();

        let removed = cache.invalidate_by_catalog_code("P100").await.unwrap();
        assert_eq!(removed, 3);

        assert!(cache.get("7801234567890").await.is_none());
        assert!(cache.get("7809999999999").await.is_none());
        assert!(cache.get("7805555555555").await.is_none());
        assert_eq!(cache.get("7800000000000").await.unwrap().codigo, "P200");
    }

    #[tokio::test]
    async fn test_invalidate_by_catalog_code_without_matches() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, 10);
        cache.set("1", &producto("P1", "1")).await.unwrap();

        assert_eq!(cache.invalidate_by_catalog_code("NOPE").await.unwrap(), 0);
        assert_eq!(cache.l1_len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_during_flush_does_not_revive_entry() {
        let store = Arc::new(PausedScanStore::default());
        let cache = Arc::new(ProductCache::new(store.clone(), 10, Duration::from_secs(3600)));
        cache.set("780", &producto("VIEJO", "780")).await.unwrap();

        let flush = tokio::spawn({
            let cache = cache.clone();
            async move { cache.invalidate_all().await }
        });
        store.scanning.notified().await;

        // L1 ya está vacío y el lock no quedó tomado durante el SCAN
        assert_eq!(cache.l1_len().await, 0);
        // El lookup concurrente aún ve L2 y promueve a L1
        assert_eq!(cache.get("780").await.unwrap().codigo, "VIEJO");

        store.resume.notify_one();
        let summary = flush.await.unwrap().unwrap();
        assert_eq!(summary.productos_l2, 1);

        // L1 ⊆ L2 tras el vaciado
        assert_eq!(cache.l1_len().await, 0);
        assert!(store.get("product:780").await.unwrap().is_none());
        assert!(cache.get("780").await.is_none());
    }

    #[tokio::test]
    async fn test_fill_started_before_flush_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), 10);

        let generation = cache.generation();
        cache.invalidate_all().await.unwrap();

        let written = cache
            .set_if_current("780", &producto("VIEJO", "780"), generation)
            .await
            .unwrap();
        assert!(!written);
        assert_eq!(cache.l1_len().await, 0);
        assert!(store.get("product:780").await.unwrap().is_none());

        // Con la generación vigente la escritura procede
        let written = cache
            .set_if_current("780", &producto("NUEVO", "780"), cache.generation())
            .await
            .unwrap();
        assert!(written);
        assert_eq!(cache.get("780").await.unwrap().codigo, "NUEVO");
    }
}
