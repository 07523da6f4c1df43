//! Input validation for API requests.
//!
//! Field validators return `Result<(), String>` so they can be collected with
//! `ValidationErrorBuilder::check`; the request-level functions return the
//! finished `ApiError`.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{RegisterRequest, UpdatePropertyRequest};

lazy_static! {
    /// Usernames: letters, digits, dot, dash and underscore, 1-25 chars
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9._-]{1,25}$").unwrap();

    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)+$")
            .unwrap();

    /// Digits with the usual separators, optional leading +
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 ().-]{5,18}[0-9]$").unwrap();
}

const MIN_PASSWORD_LEN: usize = 5;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_NAME_LEN: usize = 30;
const MAX_EMAIL_LEN: usize = 60;
const MAX_TITLE_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 1-25 letters, digits, dots, dashes or underscores".to_string(),
        );
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LEN
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("Email is too long (max {} characters)", MAX_EMAIL_LEN));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: Option<&str>) -> Result<(), String> {
    match phone {
        Some(phone) if !PHONE_REGEX.is_match(phone) => Err("Invalid phone number".to_string()),
        _ => Ok(()),
    }
}

/// A required free-text field: not blank and at most `max_len` characters.
pub fn validate_text(label: &str, value: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    if value.chars().count() > max_len {
        return Err(format!("{} is too long (max {} characters)", label, max_len));
    }
    Ok(())
}

pub fn validate_price(price: i64) -> Result<(), String> {
    if price < 0 {
        return Err("Price must not be negative".to_string());
    }
    Ok(())
}

/// Parse a price sent as a form field.
pub fn parse_price(raw: &str) -> Result<i64, String> {
    let price: i64 = raw
        .trim()
        .parse()
        .map_err(|_| "Price must be a whole number".to_string())?;
    validate_price(price)?;
    Ok(price)
}

pub fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("username", validate_username(&req.username))
        .check("password", validate_password(&req.password))
        .check("firstName", validate_text("First name", &req.first_name, MAX_NAME_LEN))
        .check("lastName", validate_text("Last name", &req.last_name, MAX_NAME_LEN))
        .check("email", validate_email(&req.email))
        .check("phone", validate_phone(req.phone.as_deref()));
    errors.finish()
}

/// Text fields of a new property. The price is checked while parsing.
pub fn validate_property_fields(
    errors: &mut ValidationErrorBuilder,
    title: &str,
    address: &str,
    description: &str,
) {
    errors
        .check("title", validate_text("Title", title, MAX_TITLE_LEN))
        .check("address", validate_text("Address", address, MAX_ADDRESS_LEN))
        .check(
            "description",
            validate_text("Description", description, MAX_DESCRIPTION_LEN),
        );
}

pub fn validate_property_update(req: &UpdatePropertyRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &req.title {
        errors.check("title", validate_text("Title", title, MAX_TITLE_LEN));
    }
    if let Some(address) = &req.address {
        errors.check("address", validate_text("Address", address, MAX_ADDRESS_LEN));
    }
    if let Some(description) = &req.description {
        errors.check(
            "description",
            validate_text("Description", description, MAX_DESCRIPTION_LEN),
        );
    }
    if let Some(price) = req.price {
        errors.check("price", validate_price(price));
    }
    errors.finish()
}
