pub mod health_routes;
pub mod pos_routes;
