//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos y variables de
//! entorno. La configuración de cache vive en `cache::cache_config`.

pub mod database;
pub mod environment;

pub use database::DatabaseConfig;
pub use environment::*;

/// Lee una variable numérica; si falta o no parsea, usa el default
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("POS_CONFIG_TEST_GARBAGE", "diez");
        assert_eq!(env_or("POS_CONFIG_TEST_GARBAGE", 10u64), 10);
        std::env::set_var("POS_CONFIG_TEST_GARBAGE", " 42 ");
        assert_eq!(env_or("POS_CONFIG_TEST_GARBAGE", 10u64), 42);
        std::env::remove_var("POS_CONFIG_TEST_GARBAGE");
    }
}
