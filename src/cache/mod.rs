//! Cache
//!
//! Cache de productos en dos niveles y control de versiones por dominio.

pub mod cache_config;
pub mod durable_store;
pub mod product_cache;
pub mod redis_client;
pub mod version_oracle;

pub use cache_config::CacheConfig;
pub use durable_store::{DurableStore, MemoryStore};
pub use product_cache::{CacheStatsSnapshot, InvalidationSummary, ProductCache};
pub use redis_client::RedisClient;
pub use version_oracle::VersionOracle;
