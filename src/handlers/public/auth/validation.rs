use std::collections::HashMap;

use crate::error::ApiError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 128;
pub const DISPLAY_NAME_MAX: usize = 100;

/// Collects per-field messages; empty means valid
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Invalid input", Some(self.0)))
        }
    }
}

pub fn required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", label))
    } else {
        Ok(())
    }
}

pub fn username(value: &str) -> Result<(), String> {
    required(value, "Username")?;
    let len = value.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        ));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err("Username may only contain letters, digits, '_' and '-'".to_string());
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Password is required".to_string());
    }
    let len = value.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(format!(
            "Password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        ));
    }
    Ok(())
}

pub fn display_name(value: &str) -> Result<(), String> {
    if value.chars().count() > DISPLAY_NAME_MAX {
        return Err(format!("Display name must be at most {} characters", DISPLAY_NAME_MAX));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(username("alice").is_ok());
        assert!(username("a_b-c9").is_ok());
        assert!(username("").is_err());
        assert!(username("ab").is_err());
        assert!(username(&"x".repeat(51)).is_err());
        assert!(username("alice smith").is_err());
        assert!(username("alice@home").is_err());
    }

    #[test]
    fn passwords() {
        assert!(password("Secret123").is_ok());
        assert!(password("").is_err());
        assert!(password("12345").is_err());
        assert!(password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn field_errors_keep_the_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors.check("username", username(""));
        errors.check("username", Err("second".to_string()));
        errors.check("password", password("Secret123"));

        let err = errors.into_result().unwrap_err();
        let body = err.to_json();
        assert_eq!(body["field_errors"]["username"], "Username is required");
        assert!(body["field_errors"].get("password").is_none());
    }
}
