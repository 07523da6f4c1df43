//! Token authentication and the login/register endpoints.
//!
//! Tokens are HS256 JWTs carrying the username and admin flag. Handlers that
//! need a caller take an [`AuthUser`]; a missing or invalid token is a 401,
//! a valid token without the right privileges is a 403.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ApiError;
use super::validation::validate_register;
use crate::db::{LoginRequest, RegisterRequest, TokenResponse, User};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub username: String,
    pub is_admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Sign a token for `user` valid for `ttl_hours`.
pub fn create_token(secret: &str, user: &User, ttl_hours: i64) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        username: user.username.clone(),
        is_admin: user.is_admin,
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        ApiError::internal("Failed to create token")
    })
}

/// Verify signature and expiry and return the claims.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// The caller identified by a valid bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin privileges required"))
        }
    }

    /// Allow the named user themselves, or any admin.
    pub fn ensure_self_or_admin(&self, username: &str) -> Result<(), ApiError> {
        if self.is_admin || self.username == username {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access this resource"))
        }
    }
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        let claims = decode_token(&state.config.auth.secret_key, token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser {
            username: claims.username,
            is_admin: claims.is_admin,
        })
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload?;

    let user = User::authenticate(&state.db, &req.username, &req.password).await?;
    let token = create_token(
        &state.config.auth.secret_key,
        &user,
        state.config.auth.token_ttl_hours,
    )?;

    debug!(username = %user.username, "User logged in");
    Ok(Json(TokenResponse { token }))
}

/// POST /auth/register
///
/// New accounts are never admins.
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(req) = payload?;
    validate_register(&req)?;

    let user = User::register(&state.db, &req, false).await?;
    let token = create_token(
        &state.config.auth.secret_key,
        &user,
        state.config.auth.token_ttl_hours,
    )?;

    info!(username = %user.username, "Registered user");
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}
