use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::{User, UserResponse};
use crate::AppState;

/// GET /users (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    auth.ensure_admin()?;

    let users: Vec<UserResponse> = User::find_all(&state.db)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(json!({ "users": users })))
}

/// GET /users/:username (self or admin)
///
/// Includes the user's bookings and the properties they own.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(username) = path?;
    auth.ensure_self_or_admin(&username)?;

    let user = User::get_detail(&state.db, &username).await?;
    Ok(Json(json!({ "user": user })))
}
