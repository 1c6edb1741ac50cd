//! Registration parameters: the opaque payload handed to the executor.

use serde::{Deserialize, Serialize};

/// Caller-supplied input for one registration.
///
/// The queue never looks inside beyond [`RegistrationParams::validate`]; the
/// executor consumes it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationParams {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("all fields are required: `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("`{0}` is not a valid email address")]
    InvalidEmail(String),
}

impl RegistrationParams {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: username.into(),
            email: email.into(),
        }
    }

    /// Check required fields (in declaration order) and the email shape.
    ///
    /// Whitespace-only values count as empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("username", &self.username),
            ("email", &self.email),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        if !looks_like_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// `local@domain` with exactly one `@`, both parts non-empty, no whitespace.
fn looks_like_email(s: &str) -> bool {
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !s.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}
