use regex::Regex;
use std::sync::OnceLock;

use super::ApiError;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

pub fn validate_integration_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid integration ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email cannot be empty"));
    }
    if !email_regex().is_match(trimmed) {
        return Err(ApiError::validation(format!(
            "Invalid email address: '{}'",
            trimmed
        )));
    }
    Ok(trimmed)
}

pub fn validate_integration_key(key: &str) -> Result<&str, ApiError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Integration key cannot be empty"));
    }

    if trimmed.len() > 255 {
        return Err(ApiError::validation(
            "Integration key must be 255 characters or less",
        ));
    }

    Ok(trimmed)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(ApiError::validation(
            "Username must be between 3 and 50 characters",
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, dots, hyphens, and underscores",
        ));
    }

    Ok(username)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_integration_id() {
        assert!(validate_integration_id(1).is_ok());
        assert!(validate_integration_id(0).is_err());
        assert!(validate_integration_id(-5).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  ops@example.com ").unwrap(), "ops@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_validate_integration_key() {
        assert_eq!(validate_integration_key(" key-1 ").unwrap(), "key-1");
        assert!(validate_integration_key("   ").is_err());
        assert!(validate_integration_key(&"k".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("alice smith").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }
}
