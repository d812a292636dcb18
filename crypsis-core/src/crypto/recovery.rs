use crate::error::{CoreError, Result};
use garde::Validate;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const RECOVERY_CODE_LEN: usize = 64;

/// The only credential that unlocks a stored private key.
///
/// Never persisted by this crate and zeroized on drop. Operations that
/// unlock a session take it by value so it does not outlive the unlock.
#[derive(Validate, Zeroize, ZeroizeOnDrop)]
#[garde(transparent)]
pub struct RecoveryCode(
    #[garde(ascii, alphanumeric, length(min = RECOVERY_CODE_LEN, max = RECOVERY_CODE_LEN))]
    String,
);

impl RecoveryCode {
    /// Parse user input; surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let code = Self(input.trim().to_owned());
        code.validate().map_err(|e| {
            CoreError::InvalidRecoveryCode(format!(
                "expected {} letters or digits ({})",
                RECOVERY_CODE_LEN, e
            ))
        })?;
        Ok(code)
    }

    /// Draw a fresh code from `[A-Za-z0-9]` using the OS CSPRNG.
    pub fn generate() -> Self {
        let code = OsRng
            .sample_iter(&Alphanumeric)
            .take(RECOVERY_CODE_LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    /// The code itself, for display to its owner or for key derivation.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecoveryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryCode(<redacted>)")
    }
}
