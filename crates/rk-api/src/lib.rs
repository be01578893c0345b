//! # rk-api
//!
//! HTTP surface for Roster Keeper: health probes, Prometheus metrics and an
//! authenticated trigger for reconciliation runs.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::{ApiTokens, AppState};
