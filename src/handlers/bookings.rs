use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::auth::Actor;
use super::{json_body, query_params};
use crate::db::queries::BookingFilter;
use crate::errors::{AppError, BookingError};
use crate::models::{ActorRole, Booking, BookingStatus};
use crate::services::booking::CreateBookingRequest;
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let req = json_body(payload)?;
    let booking = state.bookings.create_booking(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /bookings
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub role: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let query = query_params(query)?;
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{s}'")))?,
        ),
    };
    let role = match query.role.as_deref() {
        None | Some("") => None,
        Some("customer") => Some(ActorRole::Customer),
        Some("professional") => Some(ActorRole::Professional),
        Some(other) => return Err(AppError::Validation(format!("unknown role '{other}'"))),
    };

    let mut filter = BookingFilter {
        status,
        role,
        ..Default::default()
    };
    if let Some(limit) = query.limit {
        filter.limit = limit;
    }

    Ok(Json(state.bookings.list_bookings(&actor, filter)?))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_booking(&id, &actor)?))
}

// PATCH|PUT /bookings/:id/status
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let update = json_body(payload)?;

    let booking = match update.status {
        BookingStatus::Cancelled => {
            state
                .bookings
                .cancel_booking(&id, &actor, update.reason)
                .await?
        }
        status => state.bookings.change_status(&id, status, &actor).await?,
    };
    Ok(Json(booking))
}

// DELETE /bookings/:id
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Booking>, AppError> {
    // The body is optional on DELETE
    let req: CancelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid cancel body: {e}")))?
    };

    let booking = state
        .bookings
        .cancel_booking(&id, &actor, req.reason)
        .await
        .map_err(|e| match e {
            e @ BookingError::InvalidTransition { .. } => AppError::NotCancellable(e.to_string()),
            other => other.into(),
        })?;
    Ok(Json(booking))
}

// POST /bookings/:id/notes
#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

pub async fn add_note(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let note = json_body(payload)?;
    Ok(Json(state.bookings.add_note(&id, &actor, &note.text)?))
}
