//! End-to-end checks of the public API: identity export/import, recovery
//! code envelopes and message encryption between two users.

use crypsis_core::{
    decrypt_message, encrypt_message, export_private_key, export_public_key, generate_identity,
    import_private_key, import_public_key, open_private_key, seal_private_key, CoreError,
    EncryptedPrivateKeyBlob, ExportedPrivateKey, IdentityKeyPair, RecoveryCode, MIN_BLOB_LEN,
};
use proptest::prelude::*;
use std::sync::OnceLock;
use std::thread;

fn identity_a() -> &'static IdentityKeyPair {
    static KEY: OnceLock<IdentityKeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_identity().unwrap())
}

fn identity_b() -> &'static IdentityKeyPair {
    static KEY: OnceLock<IdentityKeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_identity().unwrap())
}

fn repeated(c: char) -> RecoveryCode {
    RecoveryCode::parse(&c.to_string().repeat(64)).unwrap()
}

fn exported_a() -> ExportedPrivateKey {
    export_private_key(identity_a().private_key()).unwrap()
}

#[test]
fn test_a_sends_hello_to_b() {
    let b_pem = export_public_key(identity_b().public_key()).unwrap();

    // A only ever sees B's textual public key
    let b_public = import_public_key(b_pem.as_str()).unwrap();
    let encrypted = encrypt_message(&b_public, "hello").unwrap();

    let decrypted = decrypt_message(identity_b().private_key(), &encrypted).unwrap();
    assert_eq!(decrypted, "hello");
}

#[test]
fn test_imported_public_key_encrypts_like_original() {
    let pem = export_public_key(identity_a().public_key()).unwrap();
    let imported = import_public_key(pem.as_str()).unwrap();

    let via_import = encrypt_message(&imported, "via import").unwrap();
    let via_original = encrypt_message(identity_a().public_key(), "via original").unwrap();

    let private_key = identity_a().private_key();
    assert_eq!(decrypt_message(private_key, &via_import).unwrap(), "via import");
    assert_eq!(decrypt_message(private_key, &via_original).unwrap(), "via original");
}

#[test]
fn test_wrong_recovery_code_fails_with_decryption_error() {
    let blob = seal_private_key(&exported_a(), &repeated('R')).unwrap();
    let err = open_private_key(&blob, &repeated('S')).unwrap_err();
    assert_eq!(err, CoreError::Decryption);
    assert!(err.is_wrong_secret());
}

#[test]
fn test_oversized_message_is_rejected() {
    let b_public = identity_b().public_key();
    let err = encrypt_message(b_public, &"m".repeat(300)).unwrap_err();
    assert!(matches!(err, CoreError::MessageTooLarge { len: 300, .. }));
}

#[test]
fn test_sealed_key_survives_full_restore() {
    let code = RecoveryCode::generate();
    let blob = seal_private_key(&exported_a(), &code).unwrap();

    // Simulate storage as an opaque string and a later session
    let stored = blob.into_string();
    let restored = open_private_key(&EncryptedPrivateKeyBlob::from(stored), &code).unwrap();
    let private_key = import_private_key(&restored).unwrap();

    let encrypted = encrypt_message(identity_a().public_key(), "still mine").unwrap();
    assert_eq!(decrypt_message(&private_key, &encrypted).unwrap(), "still mine");
}

#[test]
fn test_operations_run_concurrently() {
    let jwk = exported_a();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let jwk = jwk.clone();
            thread::spawn(move || {
                let code = RecoveryCode::generate();
                let blob = seal_private_key(&jwk, &code).unwrap();
                let opened = open_private_key(&blob, &code).unwrap();
                assert_eq!(opened, jwk);

                let text = format!("message {}", i);
                let encrypted = encrypt_message(identity_b().public_key(), &text).unwrap();
                assert_eq!(
                    decrypt_message(identity_b().private_key(), &encrypted).unwrap(),
                    text
                );
                blob
            })
        })
        .collect();

    let blobs: Vec<EncryptedPrivateKeyBlob> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, a) in blobs.iter().enumerate() {
        for b in &blobs[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

proptest! {
    // Each case runs PBKDF2 twice at full strength
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_seal_open_round_trip(code in "[A-Za-z0-9]{64}") {
        let code = RecoveryCode::parse(&code).unwrap();
        let jwk = exported_a();
        let blob = seal_private_key(&jwk, &code).unwrap();
        prop_assert_eq!(open_private_key(&blob, &code).unwrap(), jwk);
    }

    #[test]
    fn prop_mismatched_code_never_opens(a in "[A-Za-z0-9]{64}", b in "[A-Za-z0-9]{64}") {
        prop_assume!(a != b);
        let blob = seal_private_key(&exported_a(), &RecoveryCode::parse(&a).unwrap()).unwrap();
        let result = open_private_key(&blob, &RecoveryCode::parse(&b).unwrap());
        prop_assert_eq!(result.unwrap_err(), CoreError::Decryption);
    }
}

proptest! {
    #[test]
    fn prop_short_blobs_are_malformed(raw in proptest::collection::vec(any::<u8>(), 0..MIN_BLOB_LEN)) {
        use base64::Engine;
        let blob = EncryptedPrivateKeyBlob::from(base64::engine::general_purpose::STANDARD.encode(raw));
        let result = open_private_key(&blob, &repeated('R'));
        prop_assert!(matches!(result, Err(CoreError::MalformedBlob(_))));
    }

    #[test]
    fn prop_message_round_trip(text in "[ -~]{0,190}") {
        let encrypted = encrypt_message(identity_b().public_key(), &text).unwrap();
        prop_assert_eq!(decrypt_message(identity_b().private_key(), &encrypted).unwrap(), text);
    }

    #[test]
    fn prop_over_limit_is_rejected(extra in 1usize..400) {
        let text = "z".repeat(190 + extra);
        let result = encrypt_message(identity_b().public_key(), &text);
        prop_assert_eq!(result.unwrap_err(), CoreError::MessageTooLarge { len: 190 + extra, max: 190 });
    }
}
