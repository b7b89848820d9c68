//! Configuración de cache
//!
//! Este módulo contiene la configuración para el sistema de cache
//! de productos (L1 en memoria + L2 Redis) y del control de versiones.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::env_or;

/// Configuración del cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    pub redis_password: Option<String>,
    pub redis_db: i64,
    /// TTL de las entradas de producto en Redis (segundos)
    pub product_ttl: u64,
    /// Máximo de productos en el cache L1
    pub max_l1_entries: usize,
    /// Intervalo mínimo entre consultas de versión a la BD (segundos)
    pub version_check_interval: u64,
    /// Timeout de cada operación Redis (milisegundos)
    pub redis_timeout_ms: u64,
    /// Timeout de conexión inicial a Redis (milisegundos)
    pub redis_connect_timeout_ms: u64,
    /// Intervalo del log de tamaño del L1 (segundos)
    pub l1_cleanup_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            redis_password: None,
            redis_db: 0,
            product_ttl: 3600, // 1 hora
            max_l1_entries: 10_000,
            version_check_interval: 10,
            redis_timeout_ms: 500,
            redis_connect_timeout_ms: 5000,
            l1_cleanup_interval: 300, // 5 minutos
        }
    }
}

impl CacheConfig {
    /// Leer configuración desde variables de entorno, con defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_password: std::env::var("REDIS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            redis_db: env_or("REDIS_DB", defaults.redis_db),
            product_ttl: env_or("PRODUCT_CACHE_TTL_SECONDS", defaults.product_ttl),
            max_l1_entries: env_or("L1_MAX_ENTRIES", defaults.max_l1_entries).max(1),
            version_check_interval: env_or(
                "VERSION_CHECK_INTERVAL_SECONDS",
                defaults.version_check_interval,
            ),
            redis_timeout_ms: env_or("REDIS_TIMEOUT_MS", defaults.redis_timeout_ms),
            redis_connect_timeout_ms: env_or(
                "REDIS_CONNECT_TIMEOUT_MS",
                defaults.redis_connect_timeout_ms,
            ),
            l1_cleanup_interval: env_or("L1_CLEANUP_INTERVAL_SECONDS", defaults.l1_cleanup_interval)
                .max(1),
        }
    }

    pub fn product_ttl(&self) -> Duration {
        Duration::from_secs(self.product_ttl)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.version_check_interval)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_connect_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.l1_cleanup_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.product_ttl(), Duration::from_secs(3600));
        assert_eq!(config.check_interval(), Duration::from_secs(10));
        assert_eq!(config.redis_timeout(), Duration::from_millis(500));
        assert_eq!(config.redis_connect_timeout(), Duration::from_secs(5));
        assert!(config.max_l1_entries > 0);
    }
}
