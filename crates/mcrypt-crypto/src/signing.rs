//! Quantum-safe-styled signature envelope (simulated)
//!
//! Envelope layout:
//! ```text
//! [SIG_LEN bytes: signature][16 bytes: stamp][2 bytes: meta]
//! stamp = SHA-256(signature ‖ meta)[0..16]
//! ```
//!
//! The stamp is an anti-forgery structural gate: `verify` recomputes and
//! checks it BEFORE the signature bytes reach the verification primitive,
//! so a structurally altered envelope is rejected without ever running the
//! primitive on attacker-shaped input.
//!
//! The signature math itself is a SHAKE256 placeholder with no security
//! property; see the module docs on [`crate::kem`].

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::Zeroize;

use mcrypt_core::{CryptoError, CryptoResult};

use crate::material::constant_time_eq;

/// ML-DSA-65-shaped parameter set.
pub const SIG_PUBLIC_KEY_LEN: usize = 1952;
pub const SIG_SECRET_KEY_LEN: usize = 4032;
pub const SIG_LEN: usize = 3309;
pub const SIG_SEED_LEN: usize = 32;

/// Integrity stamp length.
pub const STAMP_LEN: usize = 16;
/// Version/algorithm meta tag length.
pub const META_LEN: usize = 2;
/// Total envelope length.
pub const ENVELOPE_LEN: usize = SIG_LEN + STAMP_LEN + META_LEN;

/// meta[0]: envelope version; meta[1]: algorithm id.
const META: [u8; META_LEN] = [1, 0x65];

/// A signature key pair derived from a random seed.
pub struct SigKeyPair {
    public: Vec<u8>,
    secret: Vec<u8>,
    seed: Option<[u8; SIG_SEED_LEN]>,
}

impl SigKeyPair {
    pub fn public(&self) -> &[u8] {
        &self.public
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn seed(&self) -> Option<&[u8; SIG_SEED_LEN]> {
        self.seed.as_ref()
    }
}

impl Drop for SigKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
        if let Some(seed) = &mut self.seed {
            seed.zeroize();
        }
    }
}

impl std::fmt::Debug for SigKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigKeyPair")
            .field("public_len", &self.public.len())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn expand(label: &str, input: &[u8], len: usize) -> Vec<u8> {
    let mut hasher = Shake256::default();
    hasher.update(label.as_bytes());
    hasher.update(&(input.len() as u64).to_be_bytes());
    hasher.update(input);
    let mut out = vec![0u8; len];
    hasher.finalize_xof().read(&mut out);
    out
}

fn public_from_secret(secret: &[u8]) -> Vec<u8> {
    expand("qs-dsa-public", secret, SIG_PUBLIC_KEY_LEN)
}

/// Generate a signature key pair from a fresh random seed.
pub fn generate_signature_keypair() -> SigKeyPair {
    let mut seed = [0u8; SIG_SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    sig_keypair_from_seed(seed)
}

/// Deterministically derive a signature key pair from a seed.
pub fn sig_keypair_from_seed(seed: [u8; SIG_SEED_LEN]) -> SigKeyPair {
    let secret = expand("qs-dsa-secret", &seed, SIG_SECRET_KEY_LEN);
    let public = public_from_secret(&secret);
    SigKeyPair {
        public,
        secret,
        seed: Some(seed),
    }
}

/// Raw signature primitive (simulated).
fn raw_sign(message: &[u8], secret_key: &[u8]) -> Vec<u8> {
    let public = public_from_secret(secret_key);
    let mut input = Vec::with_capacity(public.len() + message.len());
    input.extend_from_slice(&public);
    input.extend_from_slice(message);
    expand("qs-dsa-sig", &input, SIG_LEN)
}

/// Raw verification primitive (simulated).
fn raw_verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let mut input = Vec::with_capacity(public_key.len() + message.len());
    input.extend_from_slice(public_key);
    input.extend_from_slice(message);
    let expected = expand("qs-dsa-sig", &input, SIG_LEN);
    constant_time_eq(signature, &expected)
}

fn stamp(signature: &[u8], meta: &[u8]) -> [u8; STAMP_LEN] {
    let mut hasher = <Sha256 as Digest>::new();
    Digest::update(&mut hasher, signature);
    Digest::update(&mut hasher, meta);
    let digest = hasher.finalize();
    let mut out = [0u8; STAMP_LEN];
    out.copy_from_slice(&digest[..STAMP_LEN]);
    out
}

/// Sign a message and wrap the raw signature in the stamped envelope.
pub fn sign(message: &[u8], secret_key: &[u8]) -> CryptoResult<Vec<u8>> {
    if secret_key.len() != SIG_SECRET_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "signature secret key length {} (expected {SIG_SECRET_KEY_LEN})",
            secret_key.len()
        )));
    }

    let signature = raw_sign(message, secret_key);
    let mut envelope = Vec::with_capacity(ENVELOPE_LEN);
    envelope.extend_from_slice(&signature);
    envelope.extend_from_slice(&stamp(&signature, &META));
    envelope.extend_from_slice(&META);
    Ok(envelope)
}

/// Verify a signature envelope against a message.
///
/// Returns `false` (never an error) on any untrusted-input problem: wrong
/// length, stamp mismatch, unknown meta, or a non-verifying signature.
pub fn verify(message: &[u8], envelope: &[u8], public_key: &[u8]) -> bool {
    verify_with_primitive(message, envelope, public_key, raw_verify)
}

/// [`verify`] with an injectable verification primitive.
///
/// The stamp gate runs first; `primitive` is only invoked when the envelope
/// is structurally intact. Tests use this to observe that a corrupted stamp
/// short-circuits before the primitive.
pub fn verify_with_primitive<F>(
    message: &[u8],
    envelope: &[u8],
    public_key: &[u8],
    primitive: F,
) -> bool
where
    F: Fn(&[u8], &[u8], &[u8]) -> bool,
{
    if public_key.len() != SIG_PUBLIC_KEY_LEN || envelope.len() != ENVELOPE_LEN {
        return false;
    }

    let (signature, rest) = envelope.split_at(SIG_LEN);
    let (carried_stamp, meta) = rest.split_at(STAMP_LEN);

    // Structural gate: stamp must match before the primitive sees anything
    if !constant_time_eq(carried_stamp, &stamp(signature, meta)) {
        return false;
    }
    if meta != META {
        return false;
    }

    primitive(message, signature, public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_keypair_length_contracts() {
        let pair = generate_signature_keypair();
        assert_eq!(pair.public().len(), SIG_PUBLIC_KEY_LEN);
        assert_eq!(pair.secret().len(), SIG_SECRET_KEY_LEN);
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let p1 = sig_keypair_from_seed([3u8; SIG_SEED_LEN]);
        let p2 = sig_keypair_from_seed([3u8; SIG_SEED_LEN]);
        assert_eq!(p1.public(), p2.public());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let pair = generate_signature_keypair();
        let message = b"quantum-styled message";

        let envelope = sign(message, pair.secret()).unwrap();
        assert_eq!(envelope.len(), ENVELOPE_LEN);
        assert!(verify(message, &envelope, pair.public()));
    }

    #[test]
    fn test_wrong_message_fails() {
        let pair = generate_signature_keypair();
        let envelope = sign(b"original", pair.secret()).unwrap();
        assert!(!verify(b"altered", &envelope, pair.public()));
    }

    #[test]
    fn test_wrong_public_key_fails() {
        let pair = generate_signature_keypair();
        let other = generate_signature_keypair();
        let envelope = sign(b"message", pair.secret()).unwrap();
        assert!(!verify(b"message", &envelope, other.public()));
    }

    #[test]
    fn test_corrupted_stamp_short_circuits_primitive() {
        let pair = generate_signature_keypair();
        let mut envelope = sign(b"message", pair.secret()).unwrap();
        envelope[SIG_LEN] ^= 0x01; // first stamp byte

        let calls = AtomicUsize::new(0);
        let result = verify_with_primitive(b"message", &envelope, pair.public(), |m, s, p| {
            calls.fetch_add(1, Ordering::SeqCst);
            raw_verify(m, s, p)
        });

        assert!(!result);
        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "primitive must not run on a structurally altered envelope"
        );
    }

    #[test]
    fn test_intact_envelope_reaches_primitive_once() {
        let pair = generate_signature_keypair();
        let envelope = sign(b"message", pair.secret()).unwrap();

        let calls = AtomicUsize::new(0);
        let result = verify_with_primitive(b"message", &envelope, pair.public(), |m, s, p| {
            calls.fetch_add(1, Ordering::SeqCst);
            raw_verify(m, s, p)
        });

        assert!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_corrupted_signature_bytes_fail_stamp_gate() {
        let pair = generate_signature_keypair();
        let mut envelope = sign(b"message", pair.secret()).unwrap();
        envelope[0] ^= 0x01;

        // The stamp covers the signature, so this also dies at the gate
        assert!(!verify(b"message", &envelope, pair.public()));
    }

    #[test]
    fn test_wrong_length_inputs_are_false_not_panic() {
        let pair = generate_signature_keypair();
        assert!(!verify(b"m", b"short", pair.public()));
        assert!(!verify(b"m", &[0u8; ENVELOPE_LEN + 1], pair.public()));
        assert!(!verify(b"m", &[0u8; ENVELOPE_LEN], &[0u8; 4]));
    }

    #[test]
    fn test_unknown_meta_rejected() {
        let pair = generate_signature_keypair();
        let envelope = sign(b"message", pair.secret()).unwrap();

        // Re-stamp with a foreign meta so the structural check passes but
        // the meta gate fails
        let mut forged = envelope[..SIG_LEN].to_vec();
        let foreign_meta = [9u8, 9u8];
        forged.extend_from_slice(&stamp(&envelope[..SIG_LEN], &foreign_meta));
        forged.extend_from_slice(&foreign_meta);

        assert!(!verify(b"message", &forged, pair.public()));
    }

    #[test]
    fn test_sign_rejects_malformed_secret() {
        let err = sign(b"m", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }
}
