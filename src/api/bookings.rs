use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::{Booking, CreateBookingRequest, NewBooking, User};
use crate::AppState;

/// POST /bookings
///
/// Books for the caller unless `guestUsername` names someone else, which
/// only admins may do.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;

    let guest_username = req
        .guest_username
        .unwrap_or_else(|| auth.username.clone());
    if guest_username != auth.username {
        auth.ensure_admin()?;
    }
    User::get(&state.db, &guest_username).await?;

    let booking = Booking::create(
        &state.db,
        &NewBooking {
            property_id: req.property_id,
            guest_username,
            start_date: req.start_date,
            end_date: req.end_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "booking": booking }))))
}

/// GET /bookings (admin)
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    auth.ensure_admin()?;

    let bookings = Booking::list(&state.db).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

/// GET /bookings/:id (guest or admin)
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let booking = Booking::get(&state.db, id).await?;
    auth.ensure_self_or_admin(&booking.guest_username)?;

    Ok(Json(json!({ "booking": booking })))
}

/// DELETE /bookings/:id (guest or admin)
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let booking = Booking::get(&state.db, id).await?;
    auth.ensure_self_or_admin(&booking.guest_username)?;

    Booking::remove(&state.db, id).await?;
    info!(booking_id = id, by = %auth.username, "Booking cancelled");

    Ok(Json(json!({ "deleted": id })))
}
