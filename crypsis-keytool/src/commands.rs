use crate::error::ToolError;
use clap::Subcommand;
use crypsis_core::{
    encrypt_message, import_public_key, EncryptedMessage, KeyStore, RecoveryCode, SessionContext,
    Username,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an identity, store its sealed private key and print the new
    /// recovery code together with the public key
    Enroll { username: String },

    /// Unlock the stored key and print the matching public key
    PublicKey {
        username: String,
        #[arg(long, env = "CRYPSIS_RECOVERY_CODE", hide_env_values = true)]
        code: String,
    },

    /// Encrypt a message for the owner of a PEM public key file
    Encrypt {
        #[arg(long)]
        peer_key: PathBuf,
        message: String,
    },

    /// Decrypt a message addressed to `username`
    Decrypt {
        username: String,
        #[arg(long, env = "CRYPSIS_RECOVERY_CODE", hide_env_values = true)]
        code: String,
        ciphertext: String,
    },

    /// Re-seal the stored key under a freshly generated recovery code
    RotateCode {
        username: String,
        #[arg(long, env = "CRYPSIS_RECOVERY_CODE", hide_env_values = true)]
        code: String,
    },

    /// Delete the stored key for `username`
    Forget { username: String },
}

impl Command {
    /// Name of the command if it creates or replaces a stored key.
    pub fn writes_key(&self) -> Option<&'static str> {
        match self {
            Command::Enroll { .. } => Some("enroll"),
            Command::RotateCode { .. } => Some("rotate-code"),
            _ => None,
        }
    }
}

/// Run one command against `store` and return what should be printed.
pub fn execute(command: Command, store: &dyn KeyStore) -> Result<String, ToolError> {
    match command {
        Command::Enroll { username } => enroll(store, &username),
        Command::PublicKey { username, code } => {
            with_unlocked(store, &username, code, |session| {
                Ok(session.public_key()?.into_string())
            })
        }
        Command::Encrypt { peer_key, message } => encrypt(&peer_key, &message),
        Command::Decrypt {
            username,
            code,
            ciphertext,
        } => with_unlocked(store, &username, code, |session| {
            Ok(session.decrypt(&EncryptedMessage::from(ciphertext))?)
        }),
        Command::RotateCode { username, code } => rotate_code(store, &username, code),
        Command::Forget { username } => {
            let username = Username::parse(&username)?;
            store.remove(&username)?;
            info!(%username, "removed stored key");
            Ok(format!("Removed stored key for {}", username))
        }
    }
}

fn enroll(store: &dyn KeyStore, username: &str) -> Result<String, ToolError> {
    let username = Username::parse(username)?;
    if store.load(&username)?.is_some() {
        return Err(ToolError::AlreadyEnrolled(username));
    }

    let code = RecoveryCode::generate();
    let shown = Zeroizing::new(code.expose_secret().to_owned());

    let mut session = SessionContext::new(username.clone());
    let enrollment = session.create_identity(code);
    session.clear();
    let enrollment = enrollment?;

    store.save(&username, &enrollment.blob)?;
    info!(%username, "enrolled new identity");
    Ok(format!(
        "Recovery code for {} (shown once, keep it safe):\n{}\n\n{}",
        username,
        shown.as_str(),
        enrollment.public_key
    ))
}

fn encrypt(peer_key: &Path, message: &str) -> Result<String, ToolError> {
    let pem = fs::read_to_string(peer_key).map_err(|source| ToolError::Io {
        path: peer_key.to_path_buf(),
        source,
    })?;
    let peer = import_public_key(&pem)?;
    Ok(encrypt_message(&peer, message)?.into_string())
}

fn rotate_code(store: &dyn KeyStore, username: &str, code: String) -> Result<String, ToolError> {
    let new_code = RecoveryCode::generate();
    let shown = Zeroizing::new(new_code.expose_secret().to_owned());

    let username = Username::parse(username)?;
    let blob = with_unlocked(store, username.as_str(), code, |session| {
        Ok(session.rotate_recovery_code(new_code)?)
    })?;
    store.save(&username, &blob)?;

    Ok(format!(
        "New recovery code for {} (the old one no longer works):\n{}",
        username,
        shown.as_str()
    ))
}

/// Unlock a session for `f` and clear it afterwards, whatever the outcome.
fn with_unlocked<T>(
    store: &dyn KeyStore,
    username: &str,
    code: String,
    f: impl FnOnce(&SessionContext) -> Result<T, ToolError>,
) -> Result<T, ToolError> {
    let code = take_code(code)?;
    let mut session = SessionContext::new(Username::parse(username)?);

    let result = session
        .unlock_from_store(store, code)
        .map_err(ToolError::from)
        .and_then(|()| f(&session));
    session.clear();
    result
}

fn take_code(mut raw: String) -> Result<RecoveryCode, ToolError> {
    let code = RecoveryCode::parse(&raw);
    raw.zeroize();
    Ok(code?)
}
