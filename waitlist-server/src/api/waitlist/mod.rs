//! Waitlist API
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/waitlist | POST | add guest |
//! | /api/waitlist | GET | waiting queue (`?status=` for other statuses) |
//! | /api/waitlist/snapshot | GET | snapshot poll (`?since=<revision>`) |
//! | /api/waitlist/stream | GET | snapshot push (SSE) |
//! | /api/waitlist/reorder | POST | replace queue order |
//! | /api/waitlist/{id} | GET | one entry |
//! | /api/waitlist/{id}/status | PATCH | status transition |
//! | /api/waitlist/{id}/vip | PATCH | VIP flag |
//! | /api/waitlist/{id}/eta | GET | current ETA |

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/waitlist", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/snapshot", get(handler::snapshot))
        .route("/stream", get(handler::stream))
        .route("/reorder", post(handler::reorder))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", patch(handler::update_status))
        .route("/{id}/vip", patch(handler::toggle_vip))
        .route("/{id}/eta", get(handler::eta))
}
