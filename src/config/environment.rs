//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y del servidor HTTP.

use std::env;

use super::env_or;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    /// Vacío = CORS permisivo
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer configuración desde variables de entorno, con defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: env_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
