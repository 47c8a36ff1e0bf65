//! Health check
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /health | GET | liveness, store revision and gateway freshness |

use std::sync::Arc;

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, blocking};

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// ok | degraded
    pub status: &'static str,
    pub version: &'static str,
    pub location_id: String,
    pub epoch: String,
    pub revision: u64,
    pub waiting_count: u64,
    pub entry_count: u64,
    pub snapshot_revision: u64,
    pub snapshot_staleness_ms: u64,
    pub sms_adapter: &'static str,
}

async fn health(State(state): State<ServerState>) -> AppResult<ApiResponse<HealthResponse>> {
    let manager = Arc::clone(&state.manager);
    let stats = blocking(move || manager.stats()).await?;

    let stale = state.gateway.is_stale();
    Ok(ApiResponse::success(HealthResponse {
        status: if stale { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        location_id: state.config.location_id.clone(),
        epoch: state.manager.epoch().to_string(),
        revision: stats.revision,
        waiting_count: stats.waiting_count,
        entry_count: stats.entry_count,
        snapshot_revision: state.gateway.latest().revision,
        snapshot_staleness_ms: state.gateway.staleness().as_millis() as u64,
        sms_adapter: state.hook.sender_name(),
    }))
}
