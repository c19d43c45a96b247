use chrono::{DateTime, Utc};

use crate::errors::AppError;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Trimmed value of a required text argument.
pub fn required_text(name: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing_argument(name));
    }
    Ok(trimmed.to_string())
}

/// Trimmed value of an optional text argument; blank counts as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
