use super::recovery::RecoveryCode;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// PBKDF2 round count. Changing it makes every stored blob unreadable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// AES-256 key stretched from a recovery code. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// PBKDF2-HMAC-SHA256 over the code's UTF-8 bytes and the salt.
pub fn derive_key(code: &RecoveryCode, salt: &[u8; SALT_LEN]) -> SymmetricKey {
    stretch(code.expose_secret().as_bytes(), salt, PBKDF2_ITERATIONS)
}

fn stretch(password: &[u8], salt: &[u8], rounds: u32) -> SymmetricKey {
    let mut key = SymmetricKey([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut key.0);
    key
}
