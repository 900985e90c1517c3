use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

const SUBJECT_PREFIX: &str = "gateward:user:";

/// Composite session subject in the form `gateward:user:<id>`.
///
/// The session store persists subjects in their rendered form; everything
/// past the store decodes them back into the embedded user account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(i64);

impl SubjectId {
    /// Creates a subject for a user account id.
    #[must_use]
    pub fn from_user_id(user_id: i64) -> Self {
        Self(user_id)
    }

    /// Returns the user account id embedded in the subject.
    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.0
    }

    /// Parses the rendered form of a subject.
    pub fn parse(value: &str) -> AppResult<Self> {
        if value.len() <= SUBJECT_PREFIX.len() {
            return Err(AppError::Validation(
                "session subject is too short".to_owned(),
            ));
        }

        let Some(tail) = value.strip_prefix(SUBJECT_PREFIX) else {
            return Err(AppError::Validation(format!(
                "session subject must start with {SUBJECT_PREFIX}"
            )));
        };

        let user_id = tail.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("session subject carries a malformed user id: {error}"))
        })?;

        Ok(Self(user_id))
    }
}

impl Display for SubjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{SUBJECT_PREFIX}{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
