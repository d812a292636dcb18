//! Error types for key management and message encryption.

use thiserror::Error;

/// Errors surfaced by every fallible operation in this crate.
///
/// `Decryption` carries no detail: a wrong recovery code and a tampered blob
/// look the same to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Import input is malformed or not an RSA-2048 / e=65537 key.
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// Encrypted private key blob is not base64 or is too short.
    #[error("Malformed encrypted key blob: {0}")]
    MalformedBlob(String),

    /// Authentication or decryption failed.
    #[error("Decryption failed")]
    Decryption,

    /// Plaintext exceeds what a single RSA-OAEP block can carry.
    #[error("Message too large: {len} bytes (max {max})")]
    MessageTooLarge { len: usize, max: usize },

    #[error("Invalid recovery code: {0}")]
    InvalidRecoveryCode(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The session has no private key loaded.
    #[error("No private key loaded for this session")]
    NoKeyLoaded,

    #[error("Key storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// True when the failure means "the secret was wrong (or the data was
    /// tampered with)" rather than "the input was malformed".
    pub fn is_wrong_secret(&self) -> bool {
        matches!(self, CoreError::Decryption)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
