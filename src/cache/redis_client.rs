use anyhow::Result;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, IntoConnectionInfo};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::durable_store::DurableStore;
use super::CacheConfig;
use crate::utils::errors::{AppError, AppResult};

/// Claves por página en cada SCAN
const SCAN_COUNT: usize = 500;

/// Cliente Redis con connection manager y timeout por operación
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisClient {
    /// Crear nuevo cliente Redis
    pub async fn new(config: CacheConfig) -> Result<Self> {
        info!("🔗 Conectando a Redis: {}", config.redis_url);

        let mut connection_info = config.redis_url.as_str().into_connection_info()?;
        if let Some(password) = &config.redis_password {
            connection_info.redis.password = Some(password.clone());
        }
        connection_info.redis.db = config.redis_db;

        let client = redis::Client::open(connection_info)?;
        let connect_timeout = config.redis_connect_timeout();

        // Conexión y PING acotados: si Redis no responde, el arranque falla rápido
        let manager = tokio::time::timeout(connect_timeout, async {
            let manager = ConnectionManager::new(client).await?;
            let mut conn = manager.clone();
            let _: () = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(manager)
        })
        .await
        .map_err(|_| anyhow::anyhow!("Timeout conectando a Redis ({:?})", connect_timeout))??;

        info!("✅ Redis conectado exitosamente (db {})", config.redis_db);

        Ok(Self {
            manager,
            timeout: config.redis_timeout(),
        })
    }

    /// Ejecuta una operación con el timeout configurado
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("⚠️ Error Redis en {}: {}", op, e);
                Err(AppError::from(e))
            }
            Err(_) => {
                warn!("⏰ Timeout Redis en {} ({:?})", op, self.timeout);
                Err(AppError::CacheUnavailable(format!(
                    "redis {} timed out after {:?}",
                    op, self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl DurableStore for RedisClient {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = self
            .bounded("GET", async move { conn.get::<_, Option<String>>(key).await })
            .await?;

        match &value {
            Some(_) => debug!("📥 Redis HIT para clave: {}", key),
            None => debug!("❌ Redis MISS para clave: {}", key),
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        self.bounded("SET", async move { cmd.query_async::<_, ()>(&mut conn).await })
            .await?;
        debug!("💾 Redis SET para clave: {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let count: i64 = self
            .bounded("DEL", async move { conn.del::<_, i64>(key).await })
            .await?;
        debug!("🗑️ Redis DELETE para clave: {} (eliminados: {})", key, count);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("DEL").arg(key);
        }

        let counts: Vec<i64> = self
            .bounded("DEL pipeline", async move { pipe.query_async(&mut conn).await })
            .await?;
        Ok(counts.into_iter().filter(|c| *c > 0).count())
    }

    async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        // Cada página es una ida y vuelta acotada por el timeout
        loop {
            let mut conn = self.manager.clone();
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);

            let (next, page): (u64, Vec<String>) = self
                .bounded("SCAN", async move { cmd.query_async(&mut conn).await })
                .await?;

            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("🔍 Redis SCAN {} -> {} claves", pattern, keys.len());
        Ok(keys)
    }

    async fn set_many_atomic(&self, entries: &[(String, String)]) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET").arg(key).arg(value).ignore();
        }

        self.bounded("MULTI/EXEC", async move { pipe.query_async::<_, ()>(&mut conn).await })
            .await
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .bounded("PING", async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AppError::CacheUnavailable(format!("unexpected PING reply: {}", pong)))
        }
    }

    async fn stats(&self) -> AppResult<serde_json::Value> {
        let mut conn = self.manager.clone();
        let info: String = self
            .bounded("INFO", async move {
                redis::cmd("INFO").arg("stats").query_async(&mut conn).await
            })
            .await?;

        Ok(serde_json::to_value(RedisStats::parse(&info))?)
    }
}

/// Estadísticas del servidor Redis
#[derive(Debug, Default, serde::Serialize)]
pub struct RedisStats {
    pub total_connections_received: u64,
    pub total_commands_processed: u64,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
}

impl RedisStats {
    fn parse(info: &str) -> Self {
        let mut stats = Self::default();

        for line in info.lines() {
            let Some((name, value)) = line.trim().split_once(':') else {
                continue;
            };
            let value = value.parse().unwrap_or(0);
            match name {
                "total_connections_received" => stats.total_connections_received = value,
                "total_commands_processed" => stats.total_commands_processed = value,
                "keyspace_hits" => stats.keyspace_hits = value,
                "keyspace_misses" => stats.keyspace_misses = value,
                _ => {}
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_stats() {
        let info = "# Stats\r\ntotal_connections_received:12\r\ntotal_commands_processed:340\r\nkeyspace_hits:30\r\nkeyspace_misses:4\r\n";
        let stats = RedisStats::parse(info);
        assert_eq!(stats.total_connections_received, 12);
        assert_eq!(stats.total_commands_processed, 340);
        assert_eq!(stats.keyspace_hits, 30);
        assert_eq!(stats.keyspace_misses, 4);
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_fast() {
        let config = CacheConfig {
            // Dirección no enrutable: el connect queda colgado sin timeout
            redis_url: "redis://10.255.255.1:6379".to_string(),
            redis_connect_timeout_ms: 200,
            ..CacheConfig::default()
        };

        let start = std::time::Instant::now();
        assert!(RedisClient::new(config).await.is_err());
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
