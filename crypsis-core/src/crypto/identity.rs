use super::types::{ExportedPrivateKey, ExportedPublicKey, IdentityKeyPair};
use crate::error::{CoreError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use zeroize::Zeroizing;

/// Modulus size shared by every client on the network.
pub const MODULUS_BITS: usize = 2048;
pub const PUBLIC_EXPONENT: u32 = 65_537;

const JWK_KTY: &str = "RSA";
const JWK_ALG: &str = "RSA-OAEP-256";
const JWK_DECRYPT_OP: &str = "decrypt";

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Generate a fresh RSA-2048 identity from the OS CSPRNG.
pub fn generate_identity() -> Result<IdentityKeyPair> {
    let private_key = RsaPrivateKey::new(&mut OsRng, MODULUS_BITS)
        .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
    debug!("generated {}-bit identity key", MODULUS_BITS);
    Ok(IdentityKeyPair::from_private_key(private_key))
}

/// Export the public key as a single-line PEM envelope over its SPKI DER.
pub fn export_public_key(public_key: &RsaPublicKey) -> Result<ExportedPublicKey> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CoreError::KeyFormat(format!("Failed to encode public key: {}", e)))?;
    let body = STANDARD.encode(der.as_bytes());
    Ok(ExportedPublicKey(format!(
        "{}\n{}\n{}",
        PEM_HEADER, body, PEM_FOOTER
    )))
}

/// Parse a PEM public key envelope.
///
/// The header must open the text and the footer must close it (a single
/// trailing line break is tolerated). Line breaks inside the body are
/// ignored so that wrapped PEM from other tools still imports.
pub fn import_public_key(pem: &str) -> Result<RsaPublicKey> {
    let rest = pem
        .strip_prefix(PEM_HEADER)
        .ok_or_else(|| CoreError::KeyFormat("Missing public key header".to_string()))?;
    let rest = rest
        .strip_suffix("\r\n")
        .or_else(|| rest.strip_suffix('\n'))
        .unwrap_or(rest);
    let body = rest.strip_suffix(PEM_FOOTER).ok_or_else(|| {
        CoreError::KeyFormat("Missing public key footer or trailing content".to_string())
    })?;

    if !body.starts_with(['\n', '\r']) || !body.ends_with('\n') {
        return Err(CoreError::KeyFormat(
            "Header and footer must be on their own lines".to_string(),
        ));
    }

    let body: String = body
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .collect();
    if body.is_empty() {
        return Err(CoreError::KeyFormat("Empty public key body".to_string()));
    }

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CoreError::KeyFormat(format!("Public key is not valid base64: {}", e)))?;
    let public_key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CoreError::KeyFormat(format!("Public key is not RSA SPKI: {}", e)))?;

    check_compatible(public_key.n(), public_key.e())?;
    Ok(public_key)
}

/// Export every RSA parameter of the private key as a JWK.
pub fn export_private_key(private_key: &RsaPrivateKey) -> Result<ExportedPrivateKey> {
    let crt = CrtParams::of(private_key)?;
    let (p, q) = two_primes(private_key)?;

    Ok(ExportedPrivateKey {
        alg: Some(JWK_ALG.to_string()),
        d: encode_uint(private_key.d()),
        dp: encode_uint(&crt.dp),
        dq: encode_uint(&crt.dq),
        e: encode_uint(private_key.e()),
        ext: Some(true),
        key_ops: Some(vec![JWK_DECRYPT_OP.to_string()]),
        kty: JWK_KTY.to_string(),
        n: encode_uint(private_key.n()),
        p: encode_uint(p),
        q: encode_uint(q),
        qi: encode_uint(&crt.qi),
    })
}

/// Rebuild a private key from its JWK, rejecting anything that is not a
/// consistent RSA-2048 / e=65537 decryption key.
pub fn import_private_key(jwk: &ExportedPrivateKey) -> Result<RsaPrivateKey> {
    if jwk.kty != JWK_KTY {
        return Err(CoreError::KeyFormat(format!(
            "Unsupported key type {:?}",
            jwk.kty
        )));
    }
    if let Some(alg) = jwk.alg.as_deref() {
        if alg != JWK_ALG {
            return Err(CoreError::KeyFormat(format!(
                "Unsupported algorithm {:?}",
                alg
            )));
        }
    }
    if let Some(ops) = &jwk.key_ops {
        if !ops.iter().any(|op| op == JWK_DECRYPT_OP) {
            return Err(CoreError::KeyFormat(
                "Key is not usable for decryption".to_string(),
            ));
        }
    }

    let n = decode_uint("n", &jwk.n)?;
    let e = decode_uint("e", &jwk.e)?;
    check_compatible(&n, &e)?;

    let d = decode_uint("d", &jwk.d)?;
    let p = decode_uint("p", &jwk.p)?;
    let q = decode_uint("q", &jwk.q)?;

    let private_key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| CoreError::KeyFormat(format!("Invalid RSA parameters: {}", e)))?;
    private_key
        .validate()
        .map_err(|e| CoreError::KeyFormat(format!("Invalid RSA parameters: {}", e)))?;

    let crt = CrtParams::of(&private_key)?;
    if decode_uint("dp", &jwk.dp)? != crt.dp
        || decode_uint("dq", &jwk.dq)? != crt.dq
        || decode_uint("qi", &jwk.qi)? != crt.qi
    {
        return Err(CoreError::KeyFormat(
            "CRT parameters do not match the key".to_string(),
        ));
    }

    Ok(private_key)
}

/// Chinese-remainder parameters as JWK names them.
struct CrtParams {
    dp: BigUint,
    dq: BigUint,
    qi: BigUint,
}

impl CrtParams {
    fn of(private_key: &RsaPrivateKey) -> Result<Self> {
        let (p, q) = two_primes(private_key)?;
        let one = BigUint::from(1u8);
        let qi = private_key
            .crt_coefficient()
            .ok_or_else(|| CoreError::KeyFormat("Missing CRT coefficient".to_string()))?;

        Ok(Self {
            dp: private_key.d() % &(p - &one),
            dq: private_key.d() % &(q - &one),
            qi,
        })
    }
}

fn two_primes(private_key: &RsaPrivateKey) -> Result<(&BigUint, &BigUint)> {
    match private_key.primes() {
        [p, q] => Ok((p, q)),
        primes => Err(CoreError::KeyFormat(format!(
            "Expected two primes, found {}",
            primes.len()
        ))),
    }
}

fn check_compatible(n: &BigUint, e: &BigUint) -> Result<()> {
    if n.bits() != MODULUS_BITS {
        return Err(CoreError::KeyFormat(format!(
            "Expected a {}-bit modulus, got {} bits",
            MODULUS_BITS,
            n.bits()
        )));
    }
    if *e != BigUint::from(PUBLIC_EXPONENT) {
        return Err(CoreError::KeyFormat(
            "Unsupported public exponent".to_string(),
        ));
    }
    Ok(())
}

fn encode_uint(value: &BigUint) -> String {
    let bytes = Zeroizing::new(value.to_bytes_be());
    URL_SAFE_NO_PAD.encode(bytes.as_slice())
}

fn decode_uint(field: &str, value: &str) -> Result<BigUint> {
    let bytes = Zeroizing::new(URL_SAFE_NO_PAD.decode(value.as_bytes()).map_err(|_| {
        CoreError::KeyFormat(format!("Field {:?} is not valid base64url", field))
    })?);
    if bytes.is_empty() {
        return Err(CoreError::KeyFormat(format!("Field {:?} is empty", field)));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}
