//! RSA-2048 keys are slow to generate, so unit tests share two.

use super::identity::generate_identity;
use super::types::IdentityKeyPair;
use std::sync::OnceLock;

static ALICE: OnceLock<IdentityKeyPair> = OnceLock::new();
static BOB: OnceLock<IdentityKeyPair> = OnceLock::new();

pub fn alice() -> &'static IdentityKeyPair {
    ALICE.get_or_init(|| generate_identity().unwrap())
}

pub fn bob() -> &'static IdentityKeyPair {
    BOB.get_or_init(|| generate_identity().unwrap())
}
