use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::auth::Actor;
use super::query_params;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

// GET /notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let query = query_params(query)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let db = state
        .db
        .lock()
        .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
    let notifications = queries::get_notifications(&db, &actor, query.unread, limit)
        .map_err(|e| AppError::Internal(format!("{e:#}")))?;
    Ok(Json(notifications))
}

// POST /notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state
        .db
        .lock()
        .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
    let updated = queries::mark_notification_read(&db, &id, &actor)
        .map_err(|e| AppError::Internal(format!("{e:#}")))?;

    if !updated {
        return Err(AppError::NotFound(format!("notification {id}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
