//! Errors raised by the data-access layer.
//!
//! Model functions return [`DbError`] so callers can tell a missing row or a
//! uniqueness/overlap conflict apart from a failing database.

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Message raised by the `bookings_no_overlap` trigger
pub(crate) const OVERLAP_TRIGGER_MESSAGE: &str = "booking overlaps an existing reservation";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// True when the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// True when the error was raised by the booking overlap trigger.
pub(crate) fn is_overlap_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains(OVERLAP_TRIGGER_MESSAGE))
}
