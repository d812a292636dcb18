//! Crypsis key management and envelope encryption.
//!
//! Each user owns an RSA-2048 identity. Messages are encrypted directly to
//! the recipient's public key with RSA-OAEP/SHA-256. The private key is
//! kept at rest only as an AES-256-GCM envelope under a key stretched from
//! the user's 64-character recovery code with PBKDF2-HMAC-SHA256.
//!
//! Every primitive is a synchronous, stateless function; independent
//! sessions can run on separate threads without locking.

mod crypto;
mod error;
mod utils;

pub use crypto::*;
pub use error::{CoreError, Result};
pub use utils::validation::{Username, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH};

/// RustCrypto RSA key types, re-exported so callers need no direct `rsa`
/// dependency.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
