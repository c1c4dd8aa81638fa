//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating usernames
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap()
});

/// Maximum accepted password length
const PASSWORD_MAX_LENGTH: usize = 128;

/// Validate a username
///
/// Usernames are 3-50 characters, alphanumeric plus `_`, `-` and `.`.
pub fn validate_username(username: &str) -> bool {
    let username = username.trim();
    username.len() >= 3 && username.len() <= 50 && USERNAME_REGEX.is_match(username)
}

/// Validate a password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> bool {
    password.len() >= min_length && password.len() <= PASSWORD_MAX_LENGTH
}

/// Validate a session name
pub fn validate_session_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.len() <= 100
}
