use super::kdf::{derive_key, SALT_LEN};
use super::recovery::RecoveryCode;
use super::types::{EncryptedPrivateKeyBlob, ExportedPrivateKey};
use crate::error::{CoreError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub const NONCE_LEN: usize = 12;
/// Decoded blobs shorter than `salt || iv` cannot be opened.
pub const MIN_BLOB_LEN: usize = SALT_LEN + NONCE_LEN;

/// Encrypt the exported private key under a key stretched from `code`.
///
/// Every call draws a fresh salt and nonce, so sealing the same key with the
/// same code twice never yields the same blob.
pub fn seal_private_key(
    private_key: &ExportedPrivateKey,
    code: &RecoveryCode,
) -> Result<EncryptedPrivateKeyBlob> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let plaintext = Zeroizing::new(serde_json::to_vec(private_key).map_err(|e| {
        CoreError::KeyFormat(format!("Failed to serialize private key: {}", e))
    })?);

    let key = derive_key(code, &salt);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| CoreError::Encryption("Failed to create cipher".to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|_| CoreError::Encryption("AES-GCM encryption failed".to_string()))?;

    let mut raw = Vec::with_capacity(MIN_BLOB_LEN + ciphertext.len());
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&nonce_bytes);
    raw.extend_from_slice(&ciphertext);

    debug!(bytes = raw.len(), "sealed private key");
    Ok(EncryptedPrivateKeyBlob::from(STANDARD.encode(raw)))
}

/// Decrypt a blob produced by [`seal_private_key`].
///
/// A wrong code, a flipped bit and a truncated ciphertext all fail the GCM
/// tag check and surface as the same [`CoreError::Decryption`].
pub fn open_private_key(
    blob: &EncryptedPrivateKeyBlob,
    code: &RecoveryCode,
) -> Result<ExportedPrivateKey> {
    let raw = STANDARD
        .decode(blob.as_str().trim())
        .map_err(|e| CoreError::MalformedBlob(format!("not valid base64: {}", e)))?;
    if raw.len() < MIN_BLOB_LEN {
        return Err(CoreError::MalformedBlob(format!(
            "{} bytes, need at least {}",
            raw.len(),
            MIN_BLOB_LEN
        )));
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let salt: [u8; SALT_LEN] = salt
        .try_into()
        .map_err(|_| CoreError::MalformedBlob("bad salt length".to_string()))?;

    let key = derive_key(code, &salt);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| CoreError::Encryption("Failed to create cipher".to_string()))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                warn!("private key blob failed authentication");
                CoreError::Decryption
            })?,
    );

    let private_key = serde_json::from_slice(&plaintext).map_err(|e| {
        CoreError::KeyFormat(format!("Decrypted key is not a valid JWK: {}", e))
    })?;
    debug!("opened private key blob");
    Ok(private_key)
}
