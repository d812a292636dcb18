use super::types::EncryptedMessage;
use crate::error::{CoreError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

/// SHA-256 output size, which sets the OAEP overhead.
const OAEP_HASH_LEN: usize = 32;

/// Largest plaintext (in bytes) one OAEP block can carry for this key:
/// 190 bytes for RSA-2048.
pub fn max_plaintext_len(public_key: &RsaPublicKey) -> usize {
    public_key.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
}

/// Encrypt a message for the holder of `public_key` with RSA-OAEP/SHA-256.
///
/// Messages that do not fit in one block are rejected, never truncated.
pub fn encrypt_message(public_key: &RsaPublicKey, plaintext: &str) -> Result<EncryptedMessage> {
    let data = plaintext.as_bytes();
    let max = max_plaintext_len(public_key);
    if data.len() > max {
        return Err(CoreError::MessageTooLarge {
            len: data.len(),
            max,
        });
    }

    let ciphertext = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
        .map_err(|e| CoreError::Encryption(e.to_string()))?;
    debug!(bytes = ciphertext.len(), "encrypted message");
    Ok(EncryptedMessage::from(STANDARD.encode(ciphertext)))
}

/// Decrypt a message addressed to the holder of `private_key`.
pub fn decrypt_message(private_key: &RsaPrivateKey, message: &EncryptedMessage) -> Result<String> {
    let ciphertext = STANDARD
        .decode(message.as_str().trim())
        .map_err(|_| CoreError::Decryption)?;
    let plaintext = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|_| CoreError::Decryption)?,
    );
    std::str::from_utf8(&plaintext)
        .map(str::to_owned)
        .map_err(|_| CoreError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys::{alice, bob};
    use proptest::prelude::*;

    #[test]
    fn test_hello_between_two_identities() {
        let encrypted = encrypt_message(bob().public_key(), "hello").unwrap();
        assert_eq!(decrypt_message(bob().private_key(), &encrypted).unwrap(), "hello");
    }

    #[test]
    fn test_ciphertext_is_one_rsa_block() {
        let encrypted = encrypt_message(alice().public_key(), "hi").unwrap();
        let raw = STANDARD.decode(encrypted.as_str()).unwrap();
        assert_eq!(raw.len(), 256);
    }

    #[test]
    fn test_max_plaintext_len_for_2048_bits() {
        assert_eq!(max_plaintext_len(alice().public_key()), 190);
    }

    #[test]
    fn test_size_limit_boundary() {
        let at_limit = "a".repeat(190);
        let encrypted = encrypt_message(alice().public_key(), &at_limit).unwrap();
        assert_eq!(decrypt_message(alice().private_key(), &encrypted).unwrap(), at_limit);

        assert_eq!(
            encrypt_message(alice().public_key(), &"a".repeat(191)).unwrap_err(),
            CoreError::MessageTooLarge { len: 191, max: 190 }
        );
    }

    #[test]
    fn test_300_bytes_is_too_large() {
        assert_eq!(
            encrypt_message(alice().public_key(), &"x".repeat(300)).unwrap_err(),
            CoreError::MessageTooLarge { len: 300, max: 190 }
        );
    }

    #[test]
    fn test_limit_counts_utf8_bytes() {
        // 96 two-byte characters = 192 bytes
        let text = "é".repeat(96);
        assert!(matches!(
            encrypt_message(alice().public_key(), &text),
            Err(CoreError::MessageTooLarge { len: 192, .. })
        ));
    }

    #[test]
    fn test_wrong_key_is_decryption_error() {
        let encrypted = encrypt_message(alice().public_key(), "for alice").unwrap();
        assert_eq!(
            decrypt_message(bob().private_key(), &encrypted).unwrap_err(),
            CoreError::Decryption
        );
    }

    #[test]
    fn test_corruption_is_decryption_error() {
        let encrypted = encrypt_message(alice().public_key(), "intact").unwrap();
        let mut raw = STANDARD.decode(encrypted.as_str()).unwrap();
        raw[100] ^= 0x80;
        let corrupted = EncryptedMessage::from(STANDARD.encode(raw));
        assert_eq!(
            decrypt_message(alice().private_key(), &corrupted).unwrap_err(),
            CoreError::Decryption
        );

        let garbage = EncryptedMessage::from("%%%");
        assert_eq!(
            decrypt_message(alice().private_key(), &garbage).unwrap_err(),
            CoreError::Decryption
        );
    }

    #[test]
    fn test_encryption_is_randomized() {
        let a = encrypt_message(alice().public_key(), "same").unwrap();
        let b = encrypt_message(alice().public_key(), "same").unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_round_trip_within_limit(text in "\\PC{0,47}") {
            let encrypted = encrypt_message(alice().public_key(), &text).unwrap();
            prop_assert_eq!(decrypt_message(alice().private_key(), &encrypted).unwrap(), text);
        }
    }
}
