//! Dominios versionados
//!
//! Catálogo (`productos` + `pack_listados`) y lista de precios
//! (`lista_precios_cantera`) se versionan por separado. La versión es el
//! último `updated_at` de la tabla, serializado en RFC3339 con nanosegundos.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionDomain {
    Productos,
    ListaPrecios,
}

impl VersionDomain {
    pub const ALL: [VersionDomain; 2] = [VersionDomain::Productos, VersionDomain::ListaPrecios];

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionDomain::Productos => "productos",
            VersionDomain::ListaPrecios => "lista_precios",
        }
    }

    /// Clave Redis con la versión global del dominio
    pub fn version_key(&self) -> String {
        format!("{}:global_version", self.as_str())
    }

    /// Clave Redis con el timestamp (ms) de la última consulta a la BD
    pub fn last_check_key(&self) -> String {
        format!("{}:last_check", self.as_str())
    }
}

impl std::fmt::Display for VersionDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convierte un timestamp de la BD en string de versión
pub fn version_string(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Verdadero si `probed` es estrictamente anterior a `current`.
/// Solo se compara cuando ambas versiones son RFC3339 válidas.
pub fn is_regression(current: &str, probed: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(current),
        DateTime::parse_from_rfc3339(probed),
    ) {
        (Ok(current), Ok(probed)) => probed < current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_version_string_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(version_string(&ts), "2024-01-02T00:00:00Z");

        let ts = ts + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(version_string(&ts), "2024-01-02T00:00:00.123456789Z");
    }

    #[test]
    fn test_domain_keys_are_disjoint() {
        let mut keys = Vec::new();
        for domain in VersionDomain::ALL {
            keys.push(domain.version_key());
            keys.push(domain.last_check_key());
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| !k.starts_with("product:")));
    }

    #[test]
    fn test_is_regression() {
        assert!(is_regression("2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z"));
        assert!(!is_regression("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"));
        assert!(!is_regression("2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"));
        assert!(!is_regression("no-es-fecha", "2024-01-01T00:00:00Z"));
    }
}
