use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Long-lived RSA identity of a local user.
///
/// The private half zeroizes itself on drop; callers should still keep the
/// pair in the narrowest scope they can (see [`crate::SessionContext`]).
pub struct IdentityKeyPair {
    public_key: RsaPublicKey,
    private_key: RsaPrivateKey,
}

impl IdentityKeyPair {
    /// Rebuild the pair from its private half.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        Self {
            public_key: private_key.to_public_key(),
            private_key,
        }
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// PEM-style public key: header line, single-line base64 SPKI, footer line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportedPublicKey(pub(crate) String);

impl ExportedPublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExportedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RSA private key as a JSON Web Key.
///
/// Field order is alphabetical and fixed so that the serialized form is
/// canonical (it is what gets sealed into an [`EncryptedPrivateKeyBlob`]).
/// Integer parameters are unpadded base64url, big-endian.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ExportedPrivateKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    pub d: String,
    pub dp: String,
    pub dq: String,
    pub e: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    pub kty: String,
    pub n: String,
    pub p: String,
    pub q: String,
    pub qi: String,
}

impl fmt::Debug for ExportedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedPrivateKey")
            .field("kty", &self.kty)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// At-rest private key: base64 of `salt(16) || iv(12) || ciphertext+tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPrivateKeyBlob(String);

impl EncryptedPrivateKeyBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncryptedPrivateKeyBlob {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EncryptedPrivateKeyBlob {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Base64 of one raw RSA-OAEP ciphertext. One message, one ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedMessage(String);

impl EncryptedMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncryptedMessage {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EncryptedMessage {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
