use crypsis_core::{CoreError, Username};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is already enrolled; run `forget` first to replace the key")]
    AlreadyEnrolled(Username),

    #[error("`{0}` needs a persistent key store; the memory store is discarded on exit")]
    EphemeralStore(&'static str),
}

impl ToolError {
    /// Wrong recovery code, or a stored blob that was tampered with.
    pub fn is_wrong_secret(&self) -> bool {
        matches!(self, ToolError::Core(e) if e.is_wrong_secret())
    }
}
