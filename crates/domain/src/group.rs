use std::fmt::{Display, Formatter};

use gateward_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Unique identifier for a group row.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId(i64);

impl GroupId {
    /// Creates a group identifier from a storage value.
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

impl Display for GroupId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Minimum length of a group name.
pub const GROUP_NAME_MIN_LENGTH: usize = 3;

/// Validates a group name for creation and rename.
pub fn validate_group_name(name: &str) -> AppResult<()> {
    if name.trim().chars().count() < GROUP_NAME_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "group name is required and needs to be at least {GROUP_NAME_MIN_LENGTH} characters long"
        )));
    }

    Ok(())
}
