//! Reminder API
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/reminders/pending | GET | waiting entries whose reminder is due |
//! | /api/reminders/check | POST | run one sweep now |
//! | /api/reminders/send/{entry_id} | POST | reminder for one entry |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/reminders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/pending", get(handler::pending))
        .route("/check", post(handler::check))
        .route("/send/{entry_id}", post(handler::send))
}
