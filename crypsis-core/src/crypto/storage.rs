//! Persistence of encrypted private keys, one blob per local username.
//!
//! Only [`EncryptedPrivateKeyBlob`]s ever reach a store; decrypted key
//! material has no path to disk or to the OS credential manager.

use super::types::EncryptedPrivateKeyBlob;
use crate::error::{CoreError, Result};
use crate::utils::validation::Username;
use dashmap::DashMap;
use fd_lock::RwLock;
use keyring::credential::{CredentialBuilder, CredentialBuilderApi};
use keyring::Entry;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Where encrypted private keys live between sessions.
pub trait KeyStore: Send + Sync {
    /// `Ok(None)` when nothing is stored for `username`.
    fn load(&self, username: &Username) -> Result<Option<EncryptedPrivateKeyBlob>>;

    /// Store or replace the blob for `username`.
    fn save(&self, username: &Username, blob: &EncryptedPrivateKeyBlob) -> Result<()>;

    /// Removing a missing entry is not an error.
    fn remove(&self, username: &Username) -> Result<()>;
}

/// Process-local store, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    blobs: DashMap<Username, EncryptedPrivateKeyBlob>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, username: &Username) -> Result<Option<EncryptedPrivateKeyBlob>> {
        Ok(self.blobs.get(username).map(|entry| entry.value().clone()))
    }

    fn save(&self, username: &Username, blob: &EncryptedPrivateKeyBlob) -> Result<()> {
        self.blobs.insert(username.clone(), blob.clone());
        Ok(())
    }

    fn remove(&self, username: &Username) -> Result<()> {
        self.blobs.remove(username);
        Ok(())
    }
}

/// JSON file mapping usernames to blobs.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash never leaves a half-written key file behind. Updates hold an
/// exclusive lock on a sibling `.lock` file, so concurrent processes sharing
/// one key file never drop each other's entries.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<Username, EncryptedPrivateKeyBlob>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(CoreError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            CoreError::Storage(format!("Invalid key file {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, blobs: &BTreeMap<Username, EncryptedPrivateKeyBlob>) -> Result<()> {
        let contents = serde_json::to_string_pretty(blobs)
            .map_err(|e| CoreError::Storage(format!("Failed to serialize key file: {}", e)))?;

        let tmp_path = self.sibling(".tmp");
        let written = fs::write(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "failed to remove temp key file"
                    );
                }
            }
            return Err(CoreError::Storage(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<Username, EncryptedPrivateKeyBlob>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CoreError::Storage("Key file lock poisoned".to_string()))?;

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                CoreError::Storage(format!("Failed to open {}: {}", lock_path.display(), e))
            })?;
        let mut file_lock = RwLock::new(lock_file);
        let _held = file_lock.write().map_err(|e| {
            CoreError::Storage(format!("Failed to lock {}: {}", lock_path.display(), e))
        })?;

        let mut blobs = self.read_all()?;
        if change(&mut blobs) {
            self.write_all(&blobs)?;
        }
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, username: &Username) -> Result<Option<EncryptedPrivateKeyBlob>> {
        Ok(self.read_all()?.remove(username))
    }

    fn save(&self, username: &Username, blob: &EncryptedPrivateKeyBlob) -> Result<()> {
        self.update(|blobs| {
            blobs.insert(username.clone(), blob.clone());
            true
        })?;
        debug!(%username, path = %self.path.display(), "stored encrypted private key");
        Ok(())
    }

    fn remove(&self, username: &Username) -> Result<()> {
        self.update(|blobs| blobs.remove(username).is_some())
    }
}

const KEYRING_SERVICE: &str = "crypsis";
const KEYRING_ENTRY_PREFIX: &str = "encrypted-private-key-";

/// OS credential store (Windows Credential Manager, macOS Keychain, Linux
/// Secret Service). Holds the base64 blob as the entry's password.
///
/// Every save is read back through a fresh entry; a backend that does not
/// retain what it was given fails the save instead of losing the key.
#[derive(Clone)]
pub struct KeyringStore {
    service: String,
    builder: Option<Arc<CredentialBuilder>>,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringStore {
    /// Use the platform's default credential store.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            builder: None,
        }
    }

    /// Use `builder` for every entry instead of the platform default.
    pub fn with_credential_builder(
        service: impl Into<String>,
        builder: Box<CredentialBuilder>,
    ) -> Self {
        Self {
            service: service.into(),
            builder: Some(Arc::from(builder)),
        }
    }

    fn entry(&self, username: &Username) -> Result<Entry> {
        let account = format!("{}{}", KEYRING_ENTRY_PREFIX, username);
        let entry = match &self.builder {
            Some(builder) => builder
                .build(None, &self.service, &account)
                .map(Entry::new_with_credential),
            None => Entry::new(&self.service, &account),
        };
        entry.map_err(|e| CoreError::Storage(format!("Failed to access keyring: {}", e)))
    }
}

impl fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service", &self.service)
            .field("custom_builder", &self.builder.is_some())
            .finish()
    }
}

impl KeyStore for KeyringStore {
    fn load(&self, username: &Username) -> Result<Option<EncryptedPrivateKeyBlob>> {
        match self.entry(username)?.get_password() {
            Ok(blob) => Ok(Some(EncryptedPrivateKeyBlob::from(blob))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CoreError::Storage(format!(
                "Failed to retrieve encrypted key: {}",
                e
            ))),
        }
    }

    fn save(&self, username: &Username, blob: &EncryptedPrivateKeyBlob) -> Result<()> {
        self.entry(username)?
            .set_password(blob.as_str())
            .map_err(|e| CoreError::Storage(format!("Failed to store encrypted key: {}", e)))?;

        match self.entry(username)?.get_password() {
            Ok(stored) if stored == blob.as_str() => {
                debug!(%username, "stored encrypted private key in keyring");
                Ok(())
            }
            Ok(_) | Err(keyring::Error::NoEntry) => Err(CoreError::Storage(
                "Keyring did not retain the encrypted key".to_string(),
            )),
            Err(e) => Err(CoreError::Storage(format!(
                "Failed to verify stored encrypted key: {}",
                e
            ))),
        }
    }

    fn remove(&self, username: &Username) -> Result<()> {
        match self.entry(username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CoreError::Storage(format!(
                "Failed to delete encrypted key: {}",
                e
            ))),
        }
    }
}
