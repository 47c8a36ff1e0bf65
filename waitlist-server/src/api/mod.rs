//! HTTP API
//!
//! - [`health`] - liveness
//! - [`waitlist`] - queue commands, queries, snapshot poll and stream
//! - [`notifications`] - table-ready messages and history
//! - [`reminders`] - reminder inspection and manual sweeps

pub mod health;
pub mod notifications;
pub mod reminders;
pub mod waitlist;

#[cfg(test)]
mod tests;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// All routes, no middleware, no state
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(waitlist::router())
        .merge(notifications::router())
        .merge(reminders::router())
}

/// Router with middleware and state, ready to serve
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
