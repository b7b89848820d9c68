use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::ProductCache;

/// Tarea periódica que reporta el tamaño del L1. Termina cuando `shutdown`
/// cambia a `true` o se cierra el canal.
pub fn spawn_l1_housekeeping(
    cache: Arc<ProductCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // El primer tick es inmediato
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = cache.stats().await;
                    info!(
                        total_keys = stats.total_keys,
                        max_keys = stats.max_keys,
                        hit_rate = stats.hit_rate,
                        "🧽 Limpieza L1 cache"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("🛑 Tarea de limpieza L1 detenida");
                        break;
                    }
                }
            }
        }
    })
}
