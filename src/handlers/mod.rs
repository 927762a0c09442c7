pub mod auth;
pub mod bookings;
pub mod events;
pub mod health;
pub mod notifications;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking).delete(bookings::cancel_booking),
        )
        .route(
            "/bookings/:id/status",
            axum::routing::patch(bookings::update_status).put(bookings::update_status),
        )
        .route("/bookings/:id/notes", post(bookings::add_note))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/:id/read",
            post(notifications::mark_read),
        )
        .route("/events", get(events::events_stream))
        .with_state(state)
}

/// Unwraps a JSON body, turning axum's rejection into a 400 with our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Same as [`json_body`] for query strings.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}
