use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};

use crate::cache::{CacheStatsSnapshot, InvalidationSummary};
use crate::controllers::pos_controller::PosController;
use crate::dto::pos_dto::{
    ApiResponse, CacheVersionResponse, CodigosBarrasRequest, InvalidationResponse,
    PreloadFrecuentesQuery, PreloadResponse, ProductoLookupResponse,
};
use crate::models::{ProductoPOSResponse, VersionDomain};
use crate::services::NotifyOutcome;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Rutas del POS, montadas bajo `/api/v1/pos`
pub fn create_pos_router() -> Router<AppState> {
    Router::new()
        .route("/producto/:codigo", get(lookup_producto))
        .route("/producto/:codigo/pos", get(lookup_producto_pos))
        .route("/preload", post(preload))
        .route("/preload/frecuentes", post(preload_frecuentes))
        .route("/cache-stats", get(cache_stats))
        .route("/cache/producto/:codigo", delete(invalidate_producto))
        .route("/cache/codigo-tivendo/:codigo", delete(invalidate_codigo_tivendo))
        .route("/cache/all", delete(invalidate_all))
        .route("/cache/invalidate", post(invalidate_batch))
        .route("/cache/notify-productos-update", post(notify_productos_update))
        .route("/cache/notify-lista-precios-update", post(notify_lista_precios_update))
        .route("/cache/version", get(cache_version))
}

async fn lookup_producto(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<ApiResponse<ProductoLookupResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.lookup(&codigo).await?))
}

async fn lookup_producto_pos(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<ApiResponse<ProductoPOSResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.lookup_pos(&codigo).await?))
}

async fn preload(
    State(state): State<AppState>,
    Json(request): Json<CodigosBarrasRequest>,
) -> Result<Json<ApiResponse<PreloadResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.preload(request).await?))
}

async fn preload_frecuentes(
    State(state): State<AppState>,
    Query(query): Query<PreloadFrecuentesQuery>,
) -> Result<Json<ApiResponse<PreloadResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.preload_frecuentes(query).await?))
}

async fn cache_stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStatsSnapshot>> {
    let controller = PosController::new(&state);
    Json(controller.cache_stats().await)
}

async fn invalidate_producto(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<ApiResponse<InvalidationResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.invalidate_product(&codigo).await?))
}

async fn invalidate_codigo_tivendo(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<ApiResponse<InvalidationResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.invalidate_by_codigo_tivendo(&codigo).await?))
}

async fn invalidate_all(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InvalidationSummary>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.invalidate_all().await?))
}

async fn invalidate_batch(
    State(state): State<AppState>,
    Json(request): Json<CodigosBarrasRequest>,
) -> Result<Json<ApiResponse<InvalidationResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.invalidate_batch(request).await?))
}

async fn notify_productos_update(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NotifyOutcome>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.notify_update(VersionDomain::Productos).await?))
}

async fn notify_lista_precios_update(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NotifyOutcome>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.notify_update(VersionDomain::ListaPrecios).await?))
}

async fn cache_version(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CacheVersionResponse>>, AppError> {
    let controller = PosController::new(&state);
    Ok(Json(controller.cache_version().await?))
}
