//! Key material: generation, password derivation, hashing, HMAC,
//! constant-time comparison
//!
//! Every [`Key`] carries a SHA-256 integrity hash computed at generation
//! time. [`Key::verify_integrity`] recomputes and compares it (constant
//! time) and every engine calls it before using the key; a mismatch is
//! [`CryptoError::KeyIntegrity`], never a silent fallback.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use mcrypt_core::{Algorithm, CryptoError, CryptoResult, HashAlgorithm, KeySize};

/// Minimum accepted PBKDF2 iteration count.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// A symmetric key with an embedded integrity hash. Zeroized on drop.
#[derive(Clone)]
pub struct Key {
    bytes: Vec<u8>,
    algorithm: Algorithm,
    size: KeySize,
    integrity: [u8; 32],
}

impl Key {
    /// Generate a fresh random key of the given size class.
    pub fn generate(size: KeySize) -> Self {
        let mut bytes = vec![0u8; size.bytes()];
        OsRng.fill_bytes(&mut bytes);
        Self::from_raw(bytes, size)
    }

    /// Build a key from raw secret bytes, computing the integrity hash.
    ///
    /// This is a generation event: the hash computed here is the reference
    /// every later use is checked against.
    pub fn from_raw(bytes: Vec<u8>, size: KeySize) -> Self {
        let integrity = sha256(&bytes);
        let algorithm = match size {
            KeySize::Bits128 => Algorithm::Aes128Gcm,
            KeySize::Bits256 => Algorithm::Aes256Gcm,
        };
        Self {
            bytes,
            algorithm,
            size,
            integrity,
        }
    }

    /// Reassemble a key from persisted parts, carrying the stored integrity
    /// hash. The hash is NOT recomputed here; [`Key::verify_integrity`]
    /// decides whether the material still matches it.
    pub fn from_parts(
        bytes: Vec<u8>,
        algorithm: Algorithm,
        size: KeySize,
        integrity: [u8; 32],
    ) -> CryptoResult<Self> {
        if !algorithm.is_symmetric() {
            return Err(CryptoError::InvalidKey(format!(
                "{algorithm} is not a symmetric key algorithm"
            )));
        }
        if bytes.len() != size.bytes() {
            return Err(CryptoError::InvalidKey(format!(
                "key length {} does not match size class {} bytes",
                bytes.len(),
                size.bytes()
            )));
        }
        Ok(Self {
            bytes,
            algorithm,
            size,
            integrity,
        })
    }

    /// Recompute the integrity hash and compare it (constant time) against
    /// the carried value.
    pub fn verify_integrity(&self) -> CryptoResult<()> {
        let recomputed = sha256(&self.bytes);
        if constant_time_eq(&recomputed, &self.integrity) {
            Ok(())
        } else {
            Err(CryptoError::KeyIntegrity)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn size(&self) -> KeySize {
        self.size
    }

    /// The integrity hash carried with this key (also used as the envelope
    /// key-hash reference).
    pub fn integrity_hash(&self) -> &[u8; 32] {
        &self.integrity
    }

    /// Explicitly destroy the key material.
    pub fn destroy(mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("bytes", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("size", &self.size)
            .finish()
    }
}

/// Generate a random initialization vector.
pub fn generate_iv(len: usize) -> Vec<u8> {
    let mut iv = vec![0u8; len];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Generate a random salt for key derivation.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from a password via PBKDF2-HMAC-SHA256.
///
/// The iteration count is rejected below [`MIN_KDF_ITERATIONS`]; callers
/// configure the production value (default 200k) through `KdfConfig`.
pub fn derive_key_from_password(
    password: &SecretString,
    salt: &[u8],
    iterations: u32,
    size: KeySize,
) -> CryptoResult<Key> {
    if iterations < MIN_KDF_ITERATIONS {
        return Err(CryptoError::KeyDerivation(format!(
            "iteration count {iterations} below minimum {MIN_KDF_ITERATIONS}"
        )));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("empty salt".into()));
    }

    let mut out = vec![0u8; size.bytes()];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut out,
    );
    Ok(Key::from_raw(out, size))
}

/// Hash arbitrary data with the selected digest.
pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Compute an HMAC tag over `data` with `key`.
pub fn hmac_tag(data: &[u8], key: &[u8], algorithm: HashAlgorithm) -> CryptoResult<Vec<u8>> {
    macro_rules! mac_with {
        ($digest:ty) => {{
            let mut mac = Hmac::<$digest>::new_from_slice(key)
                .map_err(|e| CryptoError::InvalidKey(format!("HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }

    match algorithm {
        HashAlgorithm::Sha256 => mac_with!(Sha256),
        HashAlgorithm::Sha384 => mac_with!(Sha384),
        HashAlgorithm::Sha512 => mac_with!(Sha512),
    }
}

/// Constant-time byte comparison.
///
/// Unequal lengths are an immediate constant-cost false; length is not
/// treated as secret. For equal lengths the comparison time is independent
/// of where the first mismatch occurs.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let k1 = Key::generate(KeySize::Bits256);
        let k2 = Key::generate(KeySize::Bits256);
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_generated_key_passes_integrity() {
        let key = Key::generate(KeySize::Bits256);
        key.verify_integrity().unwrap();
    }

    #[test]
    fn test_tampered_key_fails_integrity() {
        let key = Key::generate(KeySize::Bits256);
        let mut bytes = key.as_bytes().to_vec();
        bytes[0] ^= 0x01;

        let tampered =
            Key::from_parts(bytes, key.algorithm(), key.size(), *key.integrity_hash()).unwrap();
        let err = tampered.verify_integrity().unwrap_err();
        assert!(matches!(err, CryptoError::KeyIntegrity));
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let key = Key::generate(KeySize::Bits128);
        for byte_idx in 0..key.as_bytes().len() {
            for bit in 0..8 {
                let mut bytes = key.as_bytes().to_vec();
                bytes[byte_idx] ^= 1 << bit;
                let tampered =
                    Key::from_parts(bytes, key.algorithm(), key.size(), *key.integrity_hash())
                        .unwrap();
                assert!(
                    tampered.verify_integrity().is_err(),
                    "bit flip at byte {byte_idx} bit {bit} must be detected"
                );
            }
        }
    }

    #[test]
    fn test_from_parts_length_check() {
        let result = Key::from_parts(vec![0u8; 16], Algorithm::Aes256Gcm, KeySize::Bits256, [0; 32]);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_from_parts_rejects_asymmetric_tag() {
        let result = Key::from_parts(vec![0u8; 32], Algorithm::RsaOaep, KeySize::Bits256, [0; 32]);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("correct horse battery staple");
        let salt = [7u8; 16];

        let k1 = derive_key_from_password(&password, &salt, 100_000, KeySize::Bits256).unwrap();
        let k2 = derive_key_from_password(&password, &salt, 100_000, KeySize::Bits256).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-password");
        let k1 = derive_key_from_password(&password, &[1u8; 16], 100_000, KeySize::Bits256).unwrap();
        let k2 = derive_key_from_password(&password, &[2u8; 16], 100_000, KeySize::Bits256).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_iteration_floor() {
        let password = SecretString::from("pw");
        let result = derive_key_from_password(&password, &[1u8; 16], 99_999, KeySize::Bits256);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn test_kdf_empty_salt_rejected() {
        let password = SecretString::from("pw");
        let result = derive_key_from_password(&password, &[], 100_000, KeySize::Bits256);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn test_hash_lengths() {
        assert_eq!(hash(b"data", HashAlgorithm::Sha256).len(), 32);
        assert_eq!(hash(b"data", HashAlgorithm::Sha384).len(), 48);
        assert_eq!(hash(b"data", HashAlgorithm::Sha512).len(), 64);
    }

    #[test]
    fn test_hmac_differs_by_key() {
        let t1 = hmac_tag(b"message", b"key-one", HashAlgorithm::Sha256).unwrap();
        let t2 = hmac_tag(b"message", b"key-two", HashAlgorithm::Sha256).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_iv_salt_lengths() {
        assert_eq!(generate_iv(12).len(), 12);
        assert_eq!(generate_salt(16).len(), 16);
        assert_ne!(generate_salt(16), generate_salt(16));
    }
}
