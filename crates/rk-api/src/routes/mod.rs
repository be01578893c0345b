//! API routes.

pub mod health;
pub mod metrics;
pub mod reconcile;

use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

/// Authenticated routes under the /api prefix.
fn api_routes() -> Router<AppState> {
    Router::new().merge(reconcile::routes())
}
