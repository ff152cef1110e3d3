pub mod auth_handler;
pub mod health_handler;
pub mod jwks_handler;
pub mod metrics_handler;

pub use auth_handler::AppState;
