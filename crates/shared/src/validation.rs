//! Common validation utilities.

use validator::ValidationError;

/// Minimum length for portal account passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Maximum length for portal account passwords (Argon2 input cap is far
/// higher; this bound keeps request payloads sane).
const MAX_PASSWORD_LEN: usize = 128;

/// Validates password strength for portal accounts.
///
/// Requirements:
/// - 8 to 128 characters
/// - at least one uppercase letter
/// - at least one lowercase letter
/// - at least one digit
///
/// Returns a `ValidationError` whose message names the failed requirement,
/// so callers can surface the reason verbatim.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        let mut err = ValidationError::new("password_too_short");
        err.message = Some("Password must be at least 8 characters".into());
        return Err(err);
    }

    if password.len() > MAX_PASSWORD_LEN {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some("Password must be at most 128 characters".into());
        return Err(err);
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        let mut err = ValidationError::new("password_no_uppercase");
        err.message = Some("Password must contain an uppercase letter".into());
        return Err(err);
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        let mut err = ValidationError::new("password_no_lowercase");
        err.message = Some("Password must contain a lowercase letter".into());
        return Err(err);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("password_no_digit");
        err.message = Some("Password must contain a digit".into());
        return Err(err);
    }

    Ok(())
}
