//! Input validation for identifiers handed to the core by the UI.

use crate::error::{CoreError, Result};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username length limits, as enforced at signup
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Letters, digits, `_`, `.` and `-`
fn validate_username_chars(value: &str, _ctx: &()) -> garde::Result {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Ok(())
    } else {
        Err(garde::Error::new(
            "may only contain letters, digits, '_', '.' and '-'",
        ))
    }
}

/// Local account name. Encrypted keys are stored per username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Validate)]
#[serde(try_from = "String", into = "String")]
#[garde(transparent)]
pub struct Username(
    #[garde(
        length(min = MIN_USERNAME_LENGTH, max = MAX_USERNAME_LENGTH),
        custom(validate_username_chars)
    )]
    String,
);

impl Username {
    pub fn parse(input: &str) -> Result<Self> {
        let username = Self(input.trim().to_owned());
        username
            .validate()
            .map_err(|e| CoreError::InvalidUsername(e.to_string()))?;
        Ok(username)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
