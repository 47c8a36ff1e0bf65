//! Waitlist API Handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::{Actor, ApiResponse, AppError, AppResult, blocking, parse_json};
use shared::waitlist::{
    EntryView, GuestIntake, QueueSnapshot, SnapshotPoll, ValidationErrors, WaitlistEntry,
    WaitlistStatus,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub since: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    pub expected_version: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipRequest {
    pub vip: bool,
    pub expected_version: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub order: Vec<u64>,
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaResponse {
    pub entry_id: u64,
    pub status: WaitlistStatus,
    pub position: Option<u32>,
    pub eta_minutes: Option<u32>,
}

fn parse_status(raw: &str, field: &str) -> AppResult<WaitlistStatus> {
    raw.parse::<WaitlistStatus>().map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add(field, e.to_string());
        crate::waitlist::QueueError::Validation(errors).into()
    })
}

/// POST /api/waitlist - add a guest at the tail
pub async fn create(
    State(state): State<ServerState>,
    actor: Actor,
    body: Bytes,
) -> AppResult<(StatusCode, ApiResponse<EntryView>)> {
    let intake: GuestIntake = parse_json(&body)?;
    let manager = Arc::clone(&state.manager);
    let view = blocking(move || manager.add_guest(&intake, actor.as_str())).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(view)))
}

/// GET /api/waitlist - waiting entries by position, or `?status=` entries
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<EntryView>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| parse_status(s, "status"))
        .transpose()?;
    let manager = Arc::clone(&state.manager);
    let entries = blocking(move || match status {
        None | Some(WaitlistStatus::Waiting) => manager.get_waitlist(),
        Some(status) => manager.list_by_status(status),
    })
    .await?;
    Ok(ApiResponse::success(entries))
}

/// GET /api/waitlist/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> AppResult<ApiResponse<EntryView>> {
    let manager = Arc::clone(&state.manager);
    let view = blocking(move || manager.get_entry(id)).await?;
    Ok(ApiResponse::success(view))
}

/// GET /api/waitlist/{id}/eta
pub async fn eta(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> AppResult<ApiResponse<EtaResponse>> {
    let manager = Arc::clone(&state.manager);
    let view = blocking(move || manager.get_entry(id)).await?;
    Ok(ApiResponse::success(EtaResponse {
        entry_id: view.entry.id,
        status: view.entry.status,
        position: view.entry.position,
        eta_minutes: view.eta_minutes,
    }))
}

/// PATCH /api/waitlist/{id}/status
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
    actor: Actor,
    body: Bytes,
) -> AppResult<ApiResponse<WaitlistEntry>> {
    let req: StatusUpdateRequest = parse_json(&body)?;
    let status = parse_status(&req.status, "status")?;
    let manager = Arc::clone(&state.manager);
    let entry = blocking(move || {
        manager.update_status(id, req.expected_version, status, actor.as_str())
    })
    .await?;
    Ok(ApiResponse::success(entry))
}

/// PATCH /api/waitlist/{id}/vip
pub async fn toggle_vip(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
    actor: Actor,
    body: Bytes,
) -> AppResult<ApiResponse<EntryView>> {
    let req: VipRequest = parse_json(&body)?;
    let manager = Arc::clone(&state.manager);
    let view =
        blocking(move || manager.toggle_vip(id, req.expected_version, req.vip, actor.as_str()))
            .await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/waitlist/reorder
pub async fn reorder(
    State(state): State<ServerState>,
    actor: Actor,
    body: Bytes,
) -> AppResult<ApiResponse<Vec<EntryView>>> {
    let req: ReorderRequest = parse_json(&body)?;
    let manager = Arc::clone(&state.manager);
    let entries =
        blocking(move || manager.reorder(&req.order, req.expected_revision, actor.as_str()))
            .await?;
    Ok(ApiResponse::success(entries))
}

/// GET /api/waitlist/snapshot?since=<revision>
pub async fn snapshot(
    State(state): State<ServerState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResponse<SnapshotPoll> {
    ApiResponse::success(state.gateway.poll(query.since))
}

fn snapshot_event(snapshot: &QueueSnapshot) -> Result<Event, AppError> {
    Event::default()
        .event("snapshot")
        .id(snapshot.revision.to_string())
        .json_data(snapshot)
        .map_err(|e| AppError::internal(format!("Failed to encode snapshot: {e}")))
}

/// GET /api/waitlist/stream - current snapshot, then one event per publish
pub async fn stream(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.gateway.subscribe();
    let events = futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = Arc::clone(&rx.borrow_and_update());
        let event = match snapshot_event(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(revision = snapshot.revision, error = %e.message, "Dropping SSE snapshot");
                Event::default().comment("snapshot unavailable")
            }
        };
        Some((Ok(event), (rx, false)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
