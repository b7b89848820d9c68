//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Redis (L2) no responde o devolvió error
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// La base de datos no respondió al consultar la versión de un dominio
    #[error("Version check failed: {0}")]
    VersionCheckFailed(String),

    /// Payload corrupto en cache
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::CacheUnavailable(e.to_string())
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str, message: String, code: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message,
            details: None,
            code: Some(code.to_string()),
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Database(e) => {
                log::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Database Error",
                        "An error occurred while accessing the database".to_string(),
                        "DB_ERROR",
                    )
                    .with_details(json!({ "sql_error": e.to_string() })),
                )
            }

            AppError::Validation(e) => {
                log::warn!("Validation error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(
                        "Validation Error",
                        "The provided data is invalid".to_string(),
                        "VALIDATION_ERROR",
                    )
                    .with_details(json!({ "fields": e.to_string() })),
                )
            }

            AppError::NotFound(msg) => {
                log::info!("Resource not found: {}", msg);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("Not Found", msg, "NOT_FOUND"),
                )
            }

            AppError::BadRequest(msg) => {
                log::warn!("Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Bad Request", msg, "BAD_REQUEST"),
                )
            }

            AppError::CacheUnavailable(msg) => {
                log::error!("Cache unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new(
                        "Cache Unavailable",
                        "The product cache could not be reached".to_string(),
                        "CACHE_UNAVAILABLE",
                    )
                    .with_details(json!({ "cache_error": msg })),
                )
            }

            AppError::VersionCheckFailed(msg) => {
                log::error!("Version check failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::new(
                        "Version Check Failed",
                        "Could not read the latest version from the database".to_string(),
                        "VERSION_CHECK_FAILED",
                    )
                    .with_details(json!({ "version_error": msg })),
                )
            }

            AppError::Serialization(e) => {
                log::error!("Serialization error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Serialization Error",
                        "A cached payload could not be decoded".to_string(),
                        "SERIALIZATION_ERROR",
                    ),
                )
            }

            AppError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Internal Server Error",
                        "An unexpected error occurred".to_string(),
                        "INTERNAL_ERROR",
                    )
                    .with_details(json!({ "internal_error": msg })),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with code '{}' not found", resource, id))
}

/// Función helper para crear errores de solicitud incorrecta
pub fn bad_request_error(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}
