//! Configuración de base de datos
//!
//! Este módulo maneja la configuración del pool de PostgreSQL con SQLx.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::env_or;

/// Configuración de la base de datos
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
    /// Timeout aplicado a cada query del repositorio
    pub query_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 25,
            min_connections: 5,
            max_lifetime: Duration::from_secs(5 * 60),
            acquire_timeout: Duration::from_millis(2000),
            query_timeout: Duration::from_millis(2000),
        }
    }

    /// `DATABASE_URL` es obligatoria; el resto tiene defaults
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set in environment variables")?;
        let defaults = Self::new(url);

        Ok(Self {
            max_connections: env_or("DB_MAX_OPEN_CONNS", defaults.max_connections),
            min_connections: env_or("DB_MIN_CONNS", defaults.min_connections),
            max_lifetime: Duration::from_secs(
                env_or("DB_CONN_MAX_LIFETIME", defaults.max_lifetime.as_secs() / 60) * 60,
            ),
            acquire_timeout: Duration::from_millis(env_or(
                "DB_ACQUIRE_TIMEOUT_MS",
                defaults.acquire_timeout.as_millis() as u64,
            )),
            query_timeout: Duration::from_millis(env_or(
                "DB_QUERY_TIMEOUT_MS",
                defaults.query_timeout.as_millis() as u64,
            )),
            ..defaults
        })
    }

    /// Crear un nuevo pool de conexiones
    pub async fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .max_lifetime(self.max_lifetime)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await
    }
}
