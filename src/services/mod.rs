//! Services module
//!
//! Este módulo contiene la lógica de negocio: resolución de códigos de
//! barras, coordinación de invalidación por versión y tareas de fondo.

pub mod barcode_resolver;
pub mod cache_housekeeping;
pub mod invalidation_coordinator;

pub use barcode_resolver::{BarcodeResolver, Resolution};
pub use cache_housekeeping::spawn_l1_housekeeping;
pub use invalidation_coordinator::{DomainVersionStatus, InvalidationCoordinator, NotifyOutcome};
