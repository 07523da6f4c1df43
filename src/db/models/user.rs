//! User models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use super::booking::Booking;
use super::property::Property;
use crate::crypto::{hash_password, verify_password};
use crate::db::error::{is_unique_violation, DbError, DbResult};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

/// Public view of a user (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            is_admin: user.is_admin,
        }
    }
}

/// A user with the bookings they made and the properties they own
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserResponse,
    pub bookings: Vec<Booking>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

const USER_COLUMNS: &str =
    "username, password, first_name, last_name, email, phone, is_admin";

impl User {
    /// Register a new user, hashing the password.
    ///
    /// Fails with `Conflict` when the username is taken.
    pub async fn register(
        db: &SqlitePool,
        req: &RegisterRequest,
        is_admin: bool,
    ) -> DbResult<User> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE username = ?")
                .bind(&req.username)
                .fetch_optional(db)
                .await?;

        if existing.is_some() {
            return Err(DbError::Conflict(format!(
                "Duplicate username: {}",
                req.username
            )));
        }

        let password_hash =
            hash_password(&req.password).map_err(|e| DbError::PasswordHash(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO users (username, password, first_name, last_name, email, phone, is_admin)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.username)
        .bind(&password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(is_admin)
        .execute(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("Duplicate username: {}", req.username))
            } else {
                DbError::Database(e)
            }
        })?;

        Self::get(db, &req.username).await
    }

    /// Check a username/password pair.
    pub async fn authenticate(db: &SqlitePool, username: &str, password: &str) -> DbResult<User> {
        let user = Self::find(db, username).await?;

        match user {
            Some(user) if verify_password(password, &user.password) => Ok(user),
            _ => Err(DbError::Unauthorized(
                "Invalid username/password".to_string(),
            )),
        }
    }

    pub async fn find(db: &SqlitePool, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    /// Get a user by username, failing with `NotFound`.
    pub async fn get(db: &SqlitePool, username: &str) -> DbResult<User> {
        Self::find(db, username)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("No user: {}", username)))
    }

    /// All users ordered by username
    pub async fn find_all(db: &SqlitePool) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(db)
        .await?;

        Ok(users)
    }

    /// Get a user together with their bookings and owned properties.
    pub async fn get_detail(db: &SqlitePool, username: &str) -> DbResult<UserDetail> {
        let user = Self::get(db, username).await?;
        let bookings = Booking::list_for_guest(db, username).await?;
        let properties = Property::list_for_owner(db, username).await?;

        Ok(UserDetail {
            user: user.into(),
            bookings,
            properties,
        })
    }
}

/// Create the configured admin account if it does not exist yet.
pub async fn ensure_admin_user(db: &SqlitePool, username: &str, password: &str) -> DbResult<()> {
    if User::find(db, username).await?.is_some() {
        return Ok(());
    }

    let req = RegisterRequest {
        username: username.to_string(),
        password: password.to_string(),
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
        email: format!("{}@sharebnb.local", username),
        phone: None,
    };
    User::register(db, &req, true).await?;

    info!(username = %username, "Created admin user");
    Ok(())
}
