//! Quantum-safe-styled key encapsulation (simulated)
//!
//! Preserves the protocol shape of an ML-KEM-768 deployment — explicit
//! byte-length contracts, encapsulate/decapsulate, shared-secret → HKDF →
//! AEAD sealing — with a SHAKE256 one-way expansion standing in for the
//! lattice math. The expansion carries NO post-quantum security property;
//! a production build must substitute a vetted primitive behind the same
//! functions. Capability reporting marks this family `simulated: true`.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::{Zeroize, Zeroizing};

use mcrypt_core::{CryptoError, CryptoResult, KeySize};

use crate::material::Key;
use crate::symmetric::{b64, Envelope, SymmetricEngine};

/// ML-KEM-768-shaped parameter set.
pub const KEM_PUBLIC_KEY_LEN: usize = 1184;
pub const KEM_SECRET_KEY_LEN: usize = 2400;
pub const KEM_CIPHERTEXT_LEN: usize = 1088;
pub const KEM_SHARED_SECRET_LEN: usize = 32;
pub const KEM_SEED_LEN: usize = 32;

/// A KEM key pair derived from a random seed.
pub struct KemKeyPair {
    public: Vec<u8>,
    secret: Vec<u8>,
    seed: Option<[u8; KEM_SEED_LEN]>,
}

impl KemKeyPair {
    pub fn public(&self) -> &[u8] {
        &self.public
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn seed(&self) -> Option<&[u8; KEM_SEED_LEN]> {
        self.seed.as_ref()
    }
}

impl Drop for KemKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
        if let Some(seed) = &mut self.seed {
            seed.zeroize();
        }
    }
}

impl std::fmt::Debug for KemKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KemKeyPair")
            .field("public_len", &self.public.len())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// One-way expansion: SHAKE256 over a domain label and input.
///
/// Placeholder for the lattice primitive; deliberately the only place the
/// simulated math lives (besides `signing::expand`).
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
    expand("qs-kem-public", secret, KEM_PUBLIC_KEY_LEN)
}

/// Generate a KEM key pair from a fresh random seed.
pub fn generate_kem_keypair() -> KemKeyPair {
    let mut seed = [0u8; KEM_SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    kem_keypair_from_seed(seed)
}

/// Deterministically derive a KEM key pair from a seed.
pub fn kem_keypair_from_seed(seed: [u8; KEM_SEED_LEN]) -> KemKeyPair {
    let secret = expand("qs-kem-secret", &seed, KEM_SECRET_KEY_LEN);
    let public = public_from_secret(&secret);
    KemKeyPair {
        public,
        secret,
        seed: Some(seed),
    }
}

/// Result of encapsulation: the ciphertext to transmit and the locally
/// derived shared secret.
pub struct Encapsulation {
    pub ciphertext: Vec<u8>,
    pub shared_secret: Zeroizing<[u8; KEM_SHARED_SECRET_LEN]>,
}

/// Encapsulate against a public key.
pub fn encapsulate(public_key: &[u8]) -> CryptoResult<Encapsulation> {
    if public_key.len() != KEM_PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "KEM public key length {} (expected {KEM_PUBLIC_KEY_LEN})",
            public_key.len()
        )));
    }

    let mut r = [0u8; KEM_SHARED_SECRET_LEN];
    OsRng.fill_bytes(&mut r);

    // First 32 bytes carry the randomness masked by the public key; the
    // remainder pads the ciphertext to the parameter-set length.
    let mask = expand("qs-kem-mask", public_key, KEM_SHARED_SECRET_LEN);
    let mut ciphertext = Vec::with_capacity(KEM_CIPHERTEXT_LEN);
    for (rb, mb) in r.iter().zip(mask.iter()) {
        ciphertext.push(rb ^ mb);
    }
    let mut filler_input = Vec::with_capacity(r.len() + public_key.len());
    filler_input.extend_from_slice(&r);
    filler_input.extend_from_slice(public_key);
    ciphertext.extend_from_slice(&expand(
        "qs-kem-filler",
        &filler_input,
        KEM_CIPHERTEXT_LEN - KEM_SHARED_SECRET_LEN,
    ));

    let shared = derive_shared(&r, public_key);
    Ok(Encapsulation {
        ciphertext,
        shared_secret: shared,
    })
}

/// Recover the shared secret from a ciphertext with the secret key.
pub fn decapsulate(
    ciphertext: &[u8],
    secret_key: &[u8],
) -> CryptoResult<Zeroizing<[u8; KEM_SHARED_SECRET_LEN]>> {
    if secret_key.len() != KEM_SECRET_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "KEM secret key length {} (expected {KEM_SECRET_KEY_LEN})",
            secret_key.len()
        )));
    }
    if ciphertext.len() != KEM_CIPHERTEXT_LEN {
        return Err(CryptoError::Decryption);
    }

    let public_key = public_from_secret(secret_key);
    let mask = expand("qs-kem-mask", &public_key, KEM_SHARED_SECRET_LEN);

    let mut r = [0u8; KEM_SHARED_SECRET_LEN];
    for (i, (cb, mb)) in ciphertext[..KEM_SHARED_SECRET_LEN]
        .iter()
        .zip(mask.iter())
        .enumerate()
    {
        r[i] = cb ^ mb;
    }

    Ok(derive_shared(&r, &public_key))
}

fn derive_shared(r: &[u8], public_key: &[u8]) -> Zeroizing<[u8; KEM_SHARED_SECRET_LEN]> {
    let mut input = Vec::with_capacity(r.len() + public_key.len());
    input.extend_from_slice(r);
    input.extend_from_slice(public_key);
    let out = expand("qs-kem-shared", &input, KEM_SHARED_SECRET_LEN);
    let mut shared = Zeroizing::new([0u8; KEM_SHARED_SECRET_LEN]);
    shared.copy_from_slice(&out);
    shared
}

/// A KEM-sealed AEAD payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBox {
    #[serde(with = "b64")]
    pub encapsulated_key: Vec<u8>,
    pub payload: Envelope,
}

/// Encapsulate → derive an AEAD key via HKDF-SHA256 → encrypt.
pub fn seal(engine: &SymmetricEngine, data: &[u8], kem_public_key: &[u8]) -> CryptoResult<SealedBox> {
    let encapsulation = encapsulate(kem_public_key)?;
    let aead_key = aead_key_from_shared(&encapsulation.shared_secret)?;
    let payload = engine.encrypt(data, &aead_key)?;
    Ok(SealedBox {
        encapsulated_key: encapsulation.ciphertext,
        payload,
    })
}

/// Decapsulate and decrypt the mirror of [`seal`].
pub fn open(engine: &SymmetricEngine, sealed: &SealedBox, secret_key: &[u8]) -> CryptoResult<Vec<u8>> {
    let shared = decapsulate(&sealed.encapsulated_key, secret_key)?;
    let aead_key = aead_key_from_shared(&shared)?;
    engine.decrypt(&sealed.payload, &aead_key)
}

fn aead_key_from_shared(shared: &[u8; KEM_SHARED_SECRET_LEN]) -> CryptoResult<Key> {
    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut okm = vec![0u8; KeySize::Bits256.bytes()];
    hkdf.expand(b"multicrypt-kem-aead", &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand: {e}")))?;
    Ok(Key::from_raw(okm, KeySize::Bits256))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcrypt_core::config::SymmetricConfig;

    fn fast_engine() -> SymmetricEngine {
        SymmetricEngine::new(&SymmetricConfig {
            timing_floor_ms: 0,
            allow_fallback: false,
        })
    }

    #[test]
    fn test_keypair_length_contracts() {
        let pair = generate_kem_keypair();
        assert_eq!(pair.public().len(), KEM_PUBLIC_KEY_LEN);
        assert_eq!(pair.secret().len(), KEM_SECRET_KEY_LEN);
        assert!(pair.seed().is_some());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let p1 = kem_keypair_from_seed([9u8; KEM_SEED_LEN]);
        let p2 = kem_keypair_from_seed([9u8; KEM_SEED_LEN]);
        assert_eq!(p1.public(), p2.public());
        assert_eq!(p1.secret(), p2.secret());

        let p3 = kem_keypair_from_seed([10u8; KEM_SEED_LEN]);
        assert_ne!(p1.public(), p3.public());
    }

    #[test]
    fn test_kem_correctness() {
        for _ in 0..8 {
            let pair = generate_kem_keypair();
            let enc = encapsulate(pair.public()).unwrap();
            assert_eq!(enc.ciphertext.len(), KEM_CIPHERTEXT_LEN);

            let shared = decapsulate(&enc.ciphertext, pair.secret()).unwrap();
            assert_eq!(&*shared, &*enc.shared_secret);
        }
    }

    #[test]
    fn test_encapsulations_differ() {
        let pair = generate_kem_keypair();
        let e1 = encapsulate(pair.public()).unwrap();
        let e2 = encapsulate(pair.public()).unwrap();
        assert_ne!(e1.ciphertext, e2.ciphertext);
        assert_ne!(&*e1.shared_secret, &*e2.shared_secret);
    }

    #[test]
    fn test_decapsulate_with_wrong_key_differs() {
        let alice = generate_kem_keypair();
        let mallory = generate_kem_keypair();

        let enc = encapsulate(alice.public()).unwrap();
        let wrong = decapsulate(&enc.ciphertext, mallory.secret()).unwrap();
        assert_ne!(&*wrong, &*enc.shared_secret);
    }

    #[test]
    fn test_length_contracts_enforced() {
        let pair = generate_kem_keypair();

        assert!(matches!(
            encapsulate(&pair.public()[1..]),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            decapsulate(&[0u8; KEM_CIPHERTEXT_LEN], &pair.secret()[1..]),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            decapsulate(&[0u8; 10], pair.secret()),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let engine = fast_engine();
        let pair = generate_kem_keypair();
        let data = b"sealed under a simulated KEM";

        let sealed = seal(&engine, data, pair.public()).unwrap();
        assert_eq!(sealed.encapsulated_key.len(), KEM_CIPHERTEXT_LEN);

        let opened = open(&engine, &sealed, pair.secret()).unwrap();
        assert_eq!(&opened[..], &data[..]);
    }

    #[test]
    fn test_open_with_wrong_secret_fails() {
        let engine = fast_engine();
        let alice = generate_kem_keypair();
        let mallory = generate_kem_keypair();

        let sealed = seal(&engine, b"for alice", alice.public()).unwrap();
        let err = open(&engine, &sealed, mallory.secret()).unwrap_err();
        // Wrong shared secret means a wrong AEAD key: the key binding check
        // rejects it
        assert!(matches!(
            err,
            CryptoError::KeyMismatch | CryptoError::Decryption
        ));
    }

    #[test]
    fn test_tampered_encapsulated_key_fails() {
        let engine = fast_engine();
        let pair = generate_kem_keypair();

        let mut sealed = seal(&engine, b"payload", pair.public()).unwrap();
        sealed.encapsulated_key[0] ^= 0x01;

        assert!(open(&engine, &sealed, pair.secret()).is_err());
    }

    #[test]
    fn test_sealed_box_json_roundtrip() {
        let engine = fast_engine();
        let pair = generate_kem_keypair();

        let sealed = seal(&engine, b"serde", pair.public()).unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        let back: SealedBox = serde_json::from_str(&json).unwrap();

        assert_eq!(open(&engine, &back, pair.secret()).unwrap(), b"serde");
    }
}
