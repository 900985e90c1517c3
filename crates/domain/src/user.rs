use std::fmt::{Display, Formatter};

use gateward_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Unique identifier for a user account row.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user identifier from a storage value.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Minimum length of a username.
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Minimum length of a plaintext password.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Validates a username for account creation.
pub fn validate_username(username: &str) -> AppResult<()> {
    if username.trim().chars().count() < USERNAME_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "username is required and needs to be at least {USERNAME_MIN_LENGTH} characters long"
        )));
    }

    Ok(())
}

/// Validates a plaintext password for account creation.
pub fn validate_plain_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password needs to be at least {PASSWORD_MIN_LENGTH} characters long"
        )));
    }

    Ok(())
}
