//! Notification API Handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::Deserialize;

use crate::core::ServerState;
use crate::notify::NotificationRecord;
use crate::utils::{ApiResponse, AppError, AppResult, blocking, parse_optional_json};

#[derive(Debug, Default, Deserialize)]
pub struct ReadyRequest {
    /// Replaces the template text
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /api/notifications/ready/{entry_id}
pub async fn notify_ready(
    State(state): State<ServerState>,
    Path(entry_id): Path<u64>,
    body: Bytes,
) -> AppResult<ApiResponse<NotificationRecord>> {
    let req: ReadyRequest = parse_optional_json(&body)?.unwrap_or_default();
    let record = state
        .hook
        .notify_ready(entry_id, req.message.as_deref())
        .await?;
    Ok(ApiResponse::success(record))
}

/// GET /api/notifications/entry/{entry_id}
pub async fn history(
    State(state): State<ServerState>,
    Path(entry_id): Path<u64>,
) -> AppResult<ApiResponse<Vec<NotificationRecord>>> {
    let hook = Arc::clone(&state.hook);
    let records = blocking(move || hook.notifications_for(entry_id)).await?;
    Ok(ApiResponse::success(records))
}

/// GET /api/notifications/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> AppResult<ApiResponse<NotificationRecord>> {
    let hook = Arc::clone(&state.hook);
    let record = blocking(move || hook.notification(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;
    Ok(ApiResponse::success(record))
}
