//! Symmetric AEAD engine: AES-GCM with key-integrity binding and
//! timing-normalized decryption
//!
//! Envelope wire layout when embedded in a container (binary):
//! ```text
//! GCM: [12 bytes: random nonce][N bytes: ciphertext][16 bytes: tag]
//! CTR: [16 bytes: random IV][N bytes: ciphertext]            (no tag)
//! ```
//!
//! Decryption runs an ordered gate — key integrity, envelope key binding,
//! algorithm match, AEAD open — and every exit path, success or failure,
//! passes a single timing-floor guard so the paths are not distinguishable
//! by wall-clock time.

use std::time::{Duration, Instant};

use aes::cipher::{KeyIvInit, StreamCipher};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use mcrypt_core::config::SymmetricConfig;
use mcrypt_core::{Algorithm, CryptoError, CryptoResult, KeySize};

use crate::material::{constant_time_eq, Key};
use crate::{AAD_TAG, IV_SIZE, NONCE_SIZE, TAG_SIZE};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// An encrypted payload plus the metadata needed to decrypt it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(with = "crate::symmetric::b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "crate::symmetric::b64")]
    pub nonce: Vec<u8>,
    /// Absent in fallback (CTR) mode: integrity is not independently
    /// verified by this layer and callers must rely on outer checksums.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::symmetric::b64::opt"
    )]
    pub auth_tag: Option<Vec<u8>>,
    pub algorithm: Algorithm,
    /// Hex SHA-256 of the producing key's raw bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hash: Option<String>,
}

impl Envelope {
    /// Flatten to the binary container layout.
    pub fn to_wire(&self) -> Vec<u8> {
        let tag_len = self.auth_tag.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(self.nonce.len() + self.ciphertext.len() + tag_len);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        if let Some(tag) = &self.auth_tag {
            out.extend_from_slice(tag);
        }
        out
    }

    /// Parse the binary container layout for the recorded algorithm.
    pub fn from_wire(algorithm: Algorithm, data: &[u8]) -> CryptoResult<Self> {
        if !algorithm.is_symmetric() {
            return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        let (nonce_len, tag_len) = if algorithm.is_authenticated() {
            (NONCE_SIZE, TAG_SIZE)
        } else {
            (IV_SIZE, 0)
        };
        if data.len() < nonce_len + tag_len {
            return Err(CryptoError::FileFormat(format!(
                "payload too short: {} bytes (minimum {})",
                data.len(),
                nonce_len + tag_len
            )));
        }
        let (nonce, rest) = data.split_at(nonce_len);
        let (ciphertext, tag) = rest.split_at(rest.len() - tag_len);
        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            nonce: nonce.to_vec(),
            auth_tag: (tag_len > 0).then(|| tag.to_vec()),
            algorithm,
            key_hash: None,
        })
    }
}

/// The AEAD engine. Mode is fixed at construction: either GCM-only or with
/// the non-authenticated CTR fallback enabled for encryption.
#[derive(Debug, Clone)]
pub struct SymmetricEngine {
    timing_floor: Duration,
    allow_fallback: bool,
}

impl Default for SymmetricEngine {
    fn default() -> Self {
        Self::new(&SymmetricConfig::default())
    }
}

impl SymmetricEngine {
    pub fn new(config: &SymmetricConfig) -> Self {
        Self {
            timing_floor: Duration::from_millis(config.timing_floor_ms),
            allow_fallback: config.allow_fallback,
        }
    }

    /// Encrypt with a fresh random nonce under the primary AEAD mode.
    pub fn encrypt(&self, plaintext: &[u8], key: &Key) -> CryptoResult<Envelope> {
        let mut nonce = vec![0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        self.encrypt_with_nonce(plaintext, key, nonce)
    }

    /// Encrypt with a caller-supplied nonce.
    ///
    /// Exists only so tests can be deterministic. Reusing a nonce under the
    /// same key voids the AEAD guarantees; production callers use
    /// [`SymmetricEngine::encrypt`].
    #[doc(hidden)]
    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        key: &Key,
        nonce: Vec<u8>,
    ) -> CryptoResult<Envelope> {
        key.verify_integrity()?;

        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "nonce length {} (expected {NONCE_SIZE})",
                nonce.len()
            )));
        }

        let payload = Payload {
            msg: plaintext,
            aad: AAD_TAG,
        };
        let mut combined = match key.size() {
            KeySize::Bits128 => Aes128Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
                .encrypt(Nonce::from_slice(&nonce), payload),
            KeySize::Bits256 => Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
                .encrypt(Nonce::from_slice(&nonce), payload),
        }
        .map_err(|_| CryptoError::Decryption)?;

        // aes-gcm appends the tag to the ciphertext; carry it separately
        let tag = combined.split_off(combined.len() - TAG_SIZE);
        let algorithm = match key.size() {
            KeySize::Bits128 => Algorithm::Aes128Gcm,
            KeySize::Bits256 => Algorithm::Aes256Gcm,
        };

        Ok(Envelope {
            ciphertext: combined,
            nonce,
            auth_tag: Some(tag),
            algorithm,
            key_hash: Some(hex::encode(key.integrity_hash())),
        })
    }

    /// Encrypt in the non-authenticated CTR fallback mode.
    ///
    /// The result omits `auth_tag`: integrity is not verified by this layer
    /// and callers must rely on an outer checksum. Only available when the
    /// engine was constructed with `allow_fallback`.
    pub fn encrypt_fallback(&self, plaintext: &[u8], key: &Key) -> CryptoResult<Envelope> {
        if !self.allow_fallback {
            return Err(CryptoError::UnsupportedAlgorithm(
                "CTR fallback disabled for this engine".into(),
            ));
        }
        key.verify_integrity()?;

        let mut iv = vec![0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut buf = plaintext.to_vec();
        apply_ctr(key, &iv, &mut buf)?;

        let algorithm = match key.size() {
            KeySize::Bits128 => Algorithm::Aes128Ctr,
            KeySize::Bits256 => Algorithm::Aes256Ctr,
        };

        Ok(Envelope {
            ciphertext: buf,
            nonce: iv,
            auth_tag: None,
            algorithm,
            key_hash: Some(hex::encode(key.integrity_hash())),
        })
    }

    /// Decrypt an envelope, enforcing the ordered integrity gate and the
    /// timing floor on every exit path.
    pub fn decrypt(&self, envelope: &Envelope, key: &Key) -> CryptoResult<Vec<u8>> {
        let started = Instant::now();
        let result = self.decrypt_inner(envelope, key);
        self.hold_timing_floor(started);
        result
    }

    fn decrypt_inner(&self, envelope: &Envelope, key: &Key) -> CryptoResult<Vec<u8>> {
        // (1) key material must match its integrity hash
        key.verify_integrity()?;

        // (2) envelope key binding, constant time
        if let Some(key_hash) = &envelope.key_hash {
            let bound = hex::decode(key_hash).map_err(|_| CryptoError::KeyMismatch)?;
            if !constant_time_eq(&bound, key.integrity_hash()) {
                return Err(CryptoError::KeyMismatch);
            }
        }

        // (3) algorithm tag must select this engine and match the key size
        let expected_bits = match envelope.algorithm {
            Algorithm::Aes128Gcm | Algorithm::Aes128Ctr => KeySize::Bits128,
            Algorithm::Aes256Gcm | Algorithm::Aes256Ctr => KeySize::Bits256,
            other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        };
        if expected_bits != key.size() {
            return Err(CryptoError::KeyMismatch);
        }

        // (4) open
        if envelope.algorithm.is_authenticated() {
            let tag = envelope.auth_tag.as_ref().ok_or(CryptoError::Decryption)?;
            if envelope.nonce.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
                return Err(CryptoError::Decryption);
            }
            let mut combined =
                Vec::with_capacity(envelope.ciphertext.len() + TAG_SIZE);
            combined.extend_from_slice(&envelope.ciphertext);
            combined.extend_from_slice(tag);

            let payload = Payload {
                msg: &combined,
                aad: AAD_TAG,
            };
            match key.size() {
                KeySize::Bits128 => Aes128Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
                    .decrypt(Nonce::from_slice(&envelope.nonce), payload),
                KeySize::Bits256 => Aes256Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
                    .decrypt(Nonce::from_slice(&envelope.nonce), payload),
            }
            .map_err(|_| CryptoError::Decryption)
        } else {
            if envelope.nonce.len() != IV_SIZE {
                return Err(CryptoError::Decryption);
            }
            let mut buf = envelope.ciphertext.clone();
            apply_ctr(key, &envelope.nonce, &mut buf)?;
            Ok(buf)
        }
    }

    /// Sleep out the remainder of the timing floor. Called on every exit
    /// path of `decrypt`, so failures at any gate and successful decryption
    /// are observationally similar in duration.
    fn hold_timing_floor(&self, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed < self.timing_floor {
            std::thread::sleep(self.timing_floor - elapsed);
        }
    }
}

fn apply_ctr(key: &Key, iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
    match key.size() {
        KeySize::Bits128 => {
            let mut cipher = Aes128Ctr::new_from_slices(key.as_bytes(), iv)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            cipher.apply_keystream(buf);
        }
        KeySize::Bits256 => {
            let mut cipher = Aes256Ctr::new_from_slices(key.as_bytes(), iv)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            cipher.apply_keystream(buf);
        }
    }
    Ok(())
}

/// Base64 serde adapter for binary envelope fields.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }

    /// Adapter for `Option<Vec<u8>>` fields (absent = None).
    pub mod opt {
        use super::{Engine, STANDARD};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
