//! Control de versión global de un dominio
//!
//! Guarda en el almacén durable la versión vigente y el instante (ms) de la
//! última consulta a la BD, para que todas las instancias compartan el throttle.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::durable_store::DurableStore;
use crate::models::VersionDomain;
use crate::utils::errors::AppResult;

pub struct VersionOracle {
    domain: VersionDomain,
    store: Arc<dyn DurableStore>,
    check_interval: Duration,
}

impl VersionOracle {
    pub fn new(domain: VersionDomain, store: Arc<dyn DurableStore>, check_interval: Duration) -> Self {
        Self {
            domain,
            store,
            check_interval,
        }
    }

    pub fn domain(&self) -> VersionDomain {
        self.domain
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Versión vigente; string vacío si nunca se ha fijado
    pub async fn get_version(&self) -> AppResult<String> {
        Ok(self
            .store
            .get(&self.domain.version_key())
            .await?
            .unwrap_or_default())
    }

    /// Verdadero si toca consultar la BD
    pub async fn should_check_authoritative(&self) -> AppResult<bool> {
        self.should_check_at(Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn should_check_at(&self, now_ms: i64) -> AppResult<bool> {
        let Some(last) = self.last_checked_at().await? else {
            return Ok(true);
        };
        let elapsed = now_ms.saturating_sub(last);
        Ok(elapsed >= self.check_interval.as_millis() as i64)
    }

    /// Instante (ms) de la última consulta; `None` si falta o no parsea
    pub async fn last_checked_at(&self) -> AppResult<Option<i64>> {
        Ok(self
            .store
            .get(&self.domain.last_check_key())
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok()))
    }

    /// Fija versión y timestamp de consulta en una sola transacción
    pub async fn set_version(&self, version: &str) -> AppResult<()> {
        let now = Utc::now().timestamp_millis().to_string();
        self.store
            .set_many_atomic(&[
                (self.domain.version_key(), version.to_string()),
                (self.domain.last_check_key(), now),
            ])
            .await?;
        debug!(domain = %self.domain, version = %version, "Versión global actualizada");
        Ok(())
    }

    /// Solo reinicia la ventana de throttle
    pub async fn touch_last_checked(&self) -> AppResult<()> {
        let now = Utc::now().timestamp_millis().to_string();
        self.store
            .set(&self.domain.last_check_key(), &now, None)
            .await
    }
}
