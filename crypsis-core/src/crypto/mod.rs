mod envelope;
mod identity;
mod kdf;
mod message;
mod recovery;
mod session;
mod storage;
mod types;

#[cfg(test)]
mod test_keys;

pub use envelope::{open_private_key, seal_private_key, MIN_BLOB_LEN, NONCE_LEN};
pub use identity::{
    export_private_key, export_public_key, generate_identity, import_private_key,
    import_public_key, MODULUS_BITS, PUBLIC_EXPONENT,
};
pub use kdf::{derive_key, SymmetricKey, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN};
pub use message::{decrypt_message, encrypt_message, max_plaintext_len};
pub use recovery::{RecoveryCode, RECOVERY_CODE_LEN};
pub use session::{Enrollment, SessionContext, SessionState};
pub use storage::{FileKeyStore, KeyStore, KeyringStore, MemoryKeyStore};
pub use types::{
    EncryptedMessage, EncryptedPrivateKeyBlob, ExportedPrivateKey, ExportedPublicKey,
    IdentityKeyPair,
};
