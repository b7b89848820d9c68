//! Servicio de búsqueda de productos para el POS
//!
//! Cache de dos niveles (memoria + Redis) con invalidación por versión de
//! catálogo y de lista de precios.

pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use middleware::cors::cors_layer;
use state::AppState;

/// Router completo de la aplicación
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api/v1/pos", routes::pos_routes::create_pos_router())
        .merge(routes::health_routes::create_health_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
