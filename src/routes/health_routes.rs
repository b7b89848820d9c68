use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "api": "/api/v1/pos"
    }))
}

/// PostgreSQL y Redis deben responder; si no, 503
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (database, redis) = tokio::join!(state.repository.ping(), state.store.ping());

    let database_status = match &database {
        Ok(()) => json!({ "status": "healthy" }),
        Err(e) => {
            log::error!("❌ Health check PostgreSQL falló: {}", e);
            json!({ "status": "unhealthy", "error": e.to_string() })
        }
    };

    let redis_status = match &redis {
        Ok(()) => {
            let stats = state.store.stats().await.unwrap_or_else(|_| json!({}));
            json!({ "status": "healthy", "stats": stats })
        }
        Err(e) => {
            log::error!("❌ Health check Redis falló: {}", e);
            json!({ "status": "unhealthy", "error": e.to_string() })
        }
    };

    let healthy = database.is_ok() && redis.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "environment": state.config.environment,
            "checks": {
                "database": database_status,
                "redis": redis_status,
            },
            "cache": state.cache.stats().await,
        })),
    )
}
