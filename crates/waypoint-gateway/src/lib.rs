//! HTTP host for the redirect and 404 phases, plus the management API.

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod state;

pub use app::App;
pub use state::{AppState, GatewayConfig, Store};
