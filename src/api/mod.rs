// HTTP boundary: routes, handlers and error mapping

pub mod athletes;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod plans;
pub mod routes;
pub mod sessions;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
