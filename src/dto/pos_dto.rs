use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::CacheStatsSnapshot;
use crate::models::ProductoCompleto;
use crate::services::DomainVersionStatus;

// Response genérica
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

// Lookup de un producto
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductoLookupResponse {
    pub producto: ProductoCompleto,
    pub cache_hit: bool,
    pub latency_ms: f64,
}

// Lista de códigos de barras (preload e invalidación en lote)
#[derive(Debug, Deserialize, Validate)]
pub struct CodigosBarrasRequest {
    #[validate(length(min = 1, max = 1000, message = "Debe enviar entre 1 y 1000 códigos de barras"))]
    pub codigos_barras: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreloadFrecuentesQuery {
    #[validate(range(min = 1, max = 5000, message = "limit debe estar entre 1 y 5000"))]
    pub limit: Option<i64>,
}

impl PreloadFrecuentesQuery {
    pub const DEFAULT_LIMIT: i64 = 1000;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    pub solicitados: usize,
    pub encontrados: usize,
    pub no_encontrados: Vec<String>,
    pub errores: usize,
    pub cache_stats: CacheStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct InvalidationResponse {
    pub invalidados: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheVersionResponse {
    pub productos: DomainVersionStatus,
    pub lista_precios: DomainVersionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_fails_validation() {
        let request = CodigosBarrasRequest {
            codigos_barras: Vec::new(),
        };
        assert!(request.validate().is_err());

        let request = CodigosBarrasRequest {
            codigos_barras: vec!["7801234567890".to_string()],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_frecuentes_limit() {
        let query = PreloadFrecuentesQuery { limit: None };
        assert!(query.validate().is_ok());
        assert_eq!(query.limit(), 1000);

        let query = PreloadFrecuentesQuery { limit: Some(0) };
        assert!(query.validate().is_err());
    }
}
