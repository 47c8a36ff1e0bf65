//! Notification API
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/notifications/ready/{entry_id} | POST | table-ready message |
//! | /api/notifications/entry/{entry_id} | GET | history for an entry, newest first |
//! | /api/notifications/{id} | GET | one delivery record |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/notifications", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/ready/{entry_id}", post(handler::notify_ready))
        .route("/entry/{entry_id}", get(handler::history))
        .route("/{id}", get(handler::get_by_id))
}
