//! Input rules shared by the API and the services.

use crate::error::{AppError, Result};
use crate::models::{AdForm, AdPatch};

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 32;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 64;
pub const TITLE_MAX_LENGTH: usize = 200;

const EXTRA_USERNAME_CHARS: &[char] = &['_'];
const EXTRA_PASSWORD_CHARS: &[char] = &['_', '!', '-'];

fn check_charset(value: &str, extra: &[char]) -> bool {
    value.chars().all(|ch| ch.is_ascii_alphanumeric() || extra.contains(&ch))
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length < min {
        return Err(AppError::ValidationError(format!(
            "{field} too short, minimum length: {min}"
        )));
    }
    if length > max {
        return Err(AppError::ValidationError(format!(
            "{field} too long, maximum length: {max}"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    check_length("username", username, USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH)?;
    if !check_charset(username, EXTRA_USERNAME_CHARS) {
        return Err(AppError::ValidationError(format!(
            "username can only have english letters, digits and {EXTRA_USERNAME_CHARS:?}"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    check_length("password", password, PASSWORD_MIN_LENGTH, PASSWORD_MAX_LENGTH)?;
    if !check_charset(password, EXTRA_PASSWORD_CHARS) {
        return Err(AppError::ValidationError(format!(
            "password can only have english letters, digits and {EXTRA_PASSWORD_CHARS:?}"
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("title must not be empty".into()));
    }
    check_length("title", title, 1, TITLE_MAX_LENGTH)
}

fn validate_price(price: i64) -> Result<()> {
    if price < 0 {
        return Err(AppError::ValidationError("price must not be negative".into()));
    }
    Ok(())
}

pub fn validate_ad_form(form: &AdForm) -> Result<()> {
    validate_title(&form.title)?;
    validate_price(form.price)
}

pub fn validate_ad_patch(patch: &AdPatch) -> Result<()> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    Ok(())
}

/// Catalog names (animals, breeds, regions, localities).
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::ValidationError("name must not be empty".into()));
    }
    Ok(())
}

/// Latitude in [-90, 90], longitude in [-180, 180].
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::ValidationError(format!(
            "coordinates out of range: {latitude}, {longitude}"
        )));
    }
    Ok(())
}
