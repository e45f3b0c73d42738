// Validation utilities module
// Custom validator functions for registration payloads

use validator::ValidationError;

/// Rejects strings made only of whitespace (length checks accept them)
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// Usernames are ASCII letters, digits, '.', '_' or '-'
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}
