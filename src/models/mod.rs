pub mod producto;
pub mod version;

pub use producto::{FechaVencimiento, Origen, ProductoCompleto, ProductoPOSResponse};
pub use version::VersionDomain;
