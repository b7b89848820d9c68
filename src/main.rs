use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pos_product_service::cache::{CacheConfig, RedisClient};
use pos_product_service::config::{DatabaseConfig, EnvironmentConfig};
use pos_product_service::repositories::PgProductRepository;
use pos_product_service::services::spawn_l1_housekeeping;
use pos_product_service::state::AppState;
use pos_product_service::{create_app, database};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    let config = EnvironmentConfig::from_env();

    // Configurar logging (RUST_LOG tiene prioridad sobre LOG_LEVEL)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🛒 POS Product Service");
    info!("================================================");

    // Inicializar base de datos
    let db_config = DatabaseConfig::from_env()?;
    let pool = match database::connect(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    // Inicializar Redis y cache
    let cache_config = CacheConfig::from_env();
    let redis_client = match RedisClient::new(cache_config.clone()).await {
        Ok(client) => client,
        Err(e) => {
            error!("❌ Error conectando a Redis: {}", e);
            return Err(anyhow::anyhow!("Error de Redis: {}", e));
        }
    };

    let repository = Arc::new(PgProductRepository::new(pool, db_config.query_timeout));
    let app_state = AppState::new(
        config.clone(),
        cache_config.clone(),
        Arc::new(redis_client),
        repository,
    );

    info!(
        "⚙️ Cache: L1 max {} entradas, TTL L2 {}s, verificación de versión cada {}s",
        cache_config.max_l1_entries, cache_config.product_ttl, cache_config.version_check_interval
    );

    // Tarea de limpieza L1
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let housekeeping = spawn_l1_housekeeping(
        app_state.cache.clone(),
        cache_config.cleanup_interval(),
        shutdown_rx,
    );

    let app = create_app(app_state);
    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /health - Health check");
    info!("   GET    /api/v1/pos/producto/:codigo - Buscar producto");
    info!("   GET    /api/v1/pos/producto/:codigo/pos - Vista POS");
    info!("   POST   /api/v1/pos/preload - Pre-cargar productos");
    info!("   POST   /api/v1/pos/preload/frecuentes - Pre-cargar frecuentes");
    info!("   GET    /api/v1/pos/cache-stats - Estadísticas de cache");
    info!("   DELETE /api/v1/pos/cache/producto/:codigo - Invalidar producto");
    info!("   DELETE /api/v1/pos/cache/codigo-tivendo/:codigo - Invalidar por código Tivendo");
    info!("   DELETE /api/v1/pos/cache/all - Invalidar todo");
    info!("   POST   /api/v1/pos/cache/invalidate - Invalidar en lote");
    info!("   POST   /api/v1/pos/cache/notify-productos-update - Notificar actualización de productos");
    info!("   POST   /api/v1/pos/cache/notify-lista-precios-update - Notificar actualización de precios");
    info!("   GET    /api/v1/pos/cache/version - Versiones vigentes");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = housekeeping.await {
        error!("❌ Tarea de limpieza terminó con error: {}", e);
    }

    if let Err(e) = served {
        error!("❌ Servidor terminó con error: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
