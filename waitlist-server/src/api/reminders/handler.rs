//! Reminder API Handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Serialize;

use crate::core::ServerState;
use crate::notify::{NotificationRecord, NotifyError, PendingReminder, SweepReport};
use crate::utils::{ApiResponse, AppResult, blocking};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub pending: Vec<PendingReminder>,
    pub total: usize,
    pub reminder_minutes_before: u32,
    pub average_turn_minutes: f64,
}

/// GET /api/reminders/pending
pub async fn pending(State(state): State<ServerState>) -> AppResult<ApiResponse<PendingResponse>> {
    let reminders = Arc::clone(&state.reminders);
    let manager = Arc::clone(&state.manager);
    let (pending, average_turn_minutes) = blocking(move || {
        Ok::<_, NotifyError>((reminders.pending()?, manager.turn_minutes()?))
    })
    .await?;
    Ok(ApiResponse::success(PendingResponse {
        total: pending.len(),
        pending,
        reminder_minutes_before: state.reminders.minutes_before(),
        average_turn_minutes,
    }))
}

/// POST /api/reminders/check
pub async fn check(State(state): State<ServerState>) -> AppResult<ApiResponse<SweepReport>> {
    let report = state.reminders.sweep().await?;
    Ok(ApiResponse::success(report))
}

/// POST /api/reminders/send/{entry_id}
pub async fn send(
    State(state): State<ServerState>,
    Path(entry_id): Path<u64>,
) -> AppResult<ApiResponse<NotificationRecord>> {
    let record = state
        .hook
        .notify_reminder(entry_id, state.reminders.minutes_before())
        .await?;
    Ok(ApiResponse::success(record))
}
