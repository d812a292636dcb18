use super::envelope::{open_private_key, seal_private_key};
use super::identity::{
    export_private_key, export_public_key, generate_identity, import_private_key,
    import_public_key,
};
use super::message::{decrypt_message, encrypt_message};
use super::recovery::RecoveryCode;
use super::storage::KeyStore;
use super::types::{EncryptedMessage, EncryptedPrivateKeyBlob, ExportedPublicKey, IdentityKeyPair};
use crate::error::{CoreError, Result};
use crate::utils::validation::Username;
use std::fmt;
use tracing::{debug, info, warn};

/// Whether a session currently holds a decrypted private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoKey,
    KeyLoaded,
}

/// What signup hands to its collaborators: the public key goes to the
/// server, the blob goes to local persistence.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub public_key: ExportedPublicKey,
    pub blob: EncryptedPrivateKeyBlob,
}

/// Holds one user's decrypted identity for the length of a session.
///
/// Nothing here clears itself implicitly: callers run [`clear`] on logout
/// and on every error path. Recovery codes are taken by value and dropped
/// (zeroized) as soon as the operation that needed them finishes.
///
/// [`clear`]: SessionContext::clear
pub struct SessionContext {
    username: Username,
    identity: Option<IdentityKeyPair>,
}

impl SessionContext {
    pub fn new(username: Username) -> Self {
        Self {
            username,
            identity: None,
        }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn state(&self) -> SessionState {
        if self.identity.is_some() {
            SessionState::KeyLoaded
        } else {
            SessionState::NoKey
        }
    }

    /// Signup: generate an identity, seal it under `code` and keep it loaded.
    pub fn create_identity(&mut self, code: RecoveryCode) -> Result<Enrollment> {
        self.clear();

        let identity = generate_identity()?;
        let public_key = export_public_key(identity.public_key())?;
        let blob = {
            let exported = export_private_key(identity.private_key())?;
            seal_private_key(&exported, &code)?
        };
        drop(code);

        self.identity = Some(identity);
        info!(username = %self.username, "created identity");
        Ok(Enrollment { public_key, blob })
    }

    /// Login: open `blob` with `code` and load the private key.
    ///
    /// Either the session ends up `KeyLoaded` or it is left cleared.
    pub fn unlock(&mut self, blob: &EncryptedPrivateKeyBlob, code: RecoveryCode) -> Result<()> {
        self.clear();

        let opened = open_private_key(blob, &code).and_then(|exported| import_private_key(&exported));
        drop(code);

        match opened {
            Ok(private_key) => {
                self.identity = Some(IdentityKeyPair::from_private_key(private_key));
                info!(username = %self.username, "unlocked private key");
                Ok(())
            }
            Err(e) => {
                warn!(username = %self.username, error = %e, "failed to unlock private key");
                self.clear();
                Err(e)
            }
        }
    }

    /// [`unlock`](Self::unlock) with the blob fetched from `store`.
    pub fn unlock_from_store(&mut self, store: &dyn KeyStore, code: RecoveryCode) -> Result<()> {
        let blob = match store.load(&self.username) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                self.clear();
                return Err(CoreError::Storage(format!(
                    "No encrypted key stored for {}",
                    self.username
                )));
            }
            Err(e) => {
                self.clear();
                return Err(e);
            }
        };
        self.unlock(&blob, code)
    }

    /// Own public key, for re-publishing or display.
    pub fn public_key(&self) -> Result<ExportedPublicKey> {
        export_public_key(self.identity()?.public_key())
    }

    /// Encrypt `plaintext` for the peer whose PEM public key is given.
    /// Needs no loaded key.
    pub fn encrypt_for(&self, peer_public_key: &str, plaintext: &str) -> Result<EncryptedMessage> {
        let peer = import_public_key(peer_public_key)?;
        encrypt_message(&peer, plaintext)
    }

    pub fn decrypt(&self, message: &EncryptedMessage) -> Result<String> {
        decrypt_message(self.identity()?.private_key(), message)
    }

    /// Re-seal the loaded key under a new recovery code.
    ///
    /// The returned blob replaces the stored one; the old code stops working
    /// once the caller persists it.
    pub fn rotate_recovery_code(&self, new_code: RecoveryCode) -> Result<EncryptedPrivateKeyBlob> {
        let exported = export_private_key(self.identity()?.private_key())?;
        let blob = seal_private_key(&exported, &new_code)?;
        info!(username = %self.username, "re-sealed private key under new recovery code");
        Ok(blob)
    }

    /// Drop any decrypted key material. Safe to call repeatedly.
    pub fn clear(&mut self) {
        if self.identity.take().is_some() {
            debug!(username = %self.username, "cleared session key");
        }
    }

    fn identity(&self) -> Result<&IdentityKeyPair> {
        self.identity.as_ref().ok_or(CoreError::NoKeyLoaded)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("username", &self.username)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::storage::MemoryKeyStore;

    fn code(c: char) -> RecoveryCode {
        RecoveryCode::parse(&c.to_string().repeat(64)).unwrap()
    }

    fn session(name: &str) -> SessionContext {
        SessionContext::new(Username::parse(name).unwrap())
    }

    #[test]
    fn test_new_session_has_no_key() {
        let s = session("alice");
        assert_eq!(s.state(), SessionState::NoKey);
        assert_eq!(s.public_key().unwrap_err(), CoreError::NoKeyLoaded);
        assert_eq!(
            s.decrypt(&EncryptedMessage::from("AAAA")).unwrap_err(),
            CoreError::NoKeyLoaded
        );
    }

    #[test]
    fn test_full_lifecycle() {
        let mut alice = session("alice");
        let enrollment = alice.create_identity(code('R')).unwrap();
        assert_eq!(alice.state(), SessionState::KeyLoaded);
        assert_eq!(alice.public_key().unwrap(), enrollment.public_key);

        alice.clear();
        assert_eq!(alice.state(), SessionState::NoKey);
        alice.clear();

        alice.unlock(&enrollment.blob, code('R')).unwrap();
        assert_eq!(alice.state(), SessionState::KeyLoaded);
        assert_eq!(alice.public_key().unwrap(), enrollment.public_key);

        let sender = session("bob");
        let encrypted = sender
            .encrypt_for(enrollment.public_key.as_str(), "hello")
            .unwrap();
        assert_eq!(alice.decrypt(&encrypted).unwrap(), "hello");
    }

    #[test]
    fn test_failed_unlock_leaves_session_cleared() {
        let mut alice = session("alice");
        let enrollment = alice.create_identity(code('R')).unwrap();
        assert_eq!(alice.state(), SessionState::KeyLoaded);

        let err = alice.unlock(&enrollment.blob, code('S')).unwrap_err();
        assert_eq!(err, CoreError::Decryption);
        assert_eq!(alice.state(), SessionState::NoKey);

        let err = alice
            .unlock(&EncryptedPrivateKeyBlob::from("AAAA"), code('R'))
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedBlob(_)));
        assert_eq!(alice.state(), SessionState::NoKey);
    }

    #[test]
    fn test_rotate_recovery_code() {
        let mut alice = session("alice");
        let enrollment = alice.create_identity(code('R')).unwrap();
        let rotated = alice.rotate_recovery_code(code('N')).unwrap();
        alice.clear();

        assert_eq!(
            alice.unlock(&rotated, code('R')).unwrap_err(),
            CoreError::Decryption
        );
        alice.unlock(&rotated, code('N')).unwrap();
        assert_eq!(alice.public_key().unwrap(), enrollment.public_key);
    }

    #[test]
    fn test_rotate_requires_loaded_key() {
        let alice = session("alice");
        assert_eq!(
            alice.rotate_recovery_code(code('N')).unwrap_err(),
            CoreError::NoKeyLoaded
        );
    }

    #[test]
    fn test_unlock_from_store() {
        let store = MemoryKeyStore::new();
        let mut alice = session("alice");
        let enrollment = alice.create_identity(code('R')).unwrap();
        store.save(alice.username(), &enrollment.blob).unwrap();
        alice.clear();

        alice.unlock_from_store(&store, code('R')).unwrap();
        assert_eq!(alice.state(), SessionState::KeyLoaded);

        let mut stranger = session("stranger");
        let err = stranger.unlock_from_store(&store, code('R')).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(stranger.state(), SessionState::NoKey);
    }

    #[test]
    fn test_encrypt_for_rejects_bad_peer_key() {
        let s = session("alice");
        assert!(matches!(
            s.encrypt_for("not a key", "hi"),
            Err(CoreError::KeyFormat(_))
        ));
    }
}
