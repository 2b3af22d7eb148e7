//! HTTP API module for the subscription, status, config and file endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
