//! Hybrid envelope: RSA-wrapped one-time AES key around an AEAD payload
//!
//! Every hybrid operation generates a fresh one-time symmetric key; the key
//! is never reused across envelopes. The optional detached signature covers
//! the envelope's structural fields and is verified before the private-key
//! operation runs, so a forged envelope never reaches RSA decryption.

use serde::{Deserialize, Serialize};

use mcrypt_core::{CryptoError, CryptoResult, KeySize};

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::asymmetric;
use crate::material::Key;
use crate::symmetric::{b64, Envelope, SymmetricEngine};

/// A symmetric payload envelope plus its RSA-wrapped one-time key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridEnvelope {
    pub payload: Envelope,
    /// The one-time symmetric key, RSA-OAEP-encrypted to the recipient.
    #[serde(with = "b64")]
    pub encrypted_key: Vec<u8>,
    /// Detached RSA-PSS signature over the structural fields.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64::opt")]
    pub signature: Option<Vec<u8>>,
}

impl HybridEnvelope {
    /// The byte string the detached signature covers: nonce, ciphertext,
    /// tag, algorithm tag, and the wrapped key.
    fn signing_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            self.payload.nonce.len()
                + self.payload.ciphertext.len()
                + self.encrypted_key.len()
                + 32,
        );
        buf.extend_from_slice(&self.payload.nonce);
        buf.extend_from_slice(&self.payload.ciphertext);
        if let Some(tag) = &self.payload.auth_tag {
            buf.extend_from_slice(tag);
        }
        buf.extend_from_slice(self.payload.algorithm.as_str().as_bytes());
        buf.extend_from_slice(&self.encrypted_key);
        buf
    }
}

/// Encrypt `plaintext` to `recipient`, optionally signing the envelope's
/// structural fields with `signer`.
pub fn hybrid_encrypt(
    engine: &SymmetricEngine,
    plaintext: &[u8],
    recipient: &RsaPublicKey,
    signer: Option<&RsaPrivateKey>,
) -> CryptoResult<HybridEnvelope> {
    // One-time key; dropped (and zeroized) at the end of this call
    let one_time = Key::generate(KeySize::Bits256);

    let payload = engine.encrypt(plaintext, &one_time)?;
    let encrypted_key = asymmetric::encrypt(one_time.as_bytes(), recipient)?;

    let mut envelope = HybridEnvelope {
        payload,
        encrypted_key,
        signature: None,
    };
    if let Some(signer) = signer {
        envelope.signature = Some(asymmetric::sign(&envelope.signing_payload(), signer));
    }
    Ok(envelope)
}

/// Decrypt a hybrid envelope with the recipient's private key.
///
/// When `verifier` is supplied, the detached signature is checked first —
/// before the private-key operation — and a missing or invalid signature
/// fails fast with `SignatureVerification`.
pub fn hybrid_decrypt(
    engine: &SymmetricEngine,
    envelope: &HybridEnvelope,
    private: &RsaPrivateKey,
    verifier: Option<&RsaPublicKey>,
) -> CryptoResult<Vec<u8>> {
    if let Some(verifier) = verifier {
        let signature = envelope
            .signature
            .as_deref()
            .ok_or(CryptoError::SignatureVerification)?;
        if !asymmetric::verify(&envelope.signing_payload(), signature, verifier) {
            return Err(CryptoError::SignatureVerification);
        }
    }

    let key_bytes = asymmetric::decrypt(&envelope.encrypted_key, private)?;
    if key_bytes.len() != KeySize::Bits256.bytes() {
        return Err(CryptoError::InvalidKey(format!(
            "unwrapped key has wrong size: {} bytes",
            key_bytes.len()
        )));
    }
    let one_time = Key::from_raw(key_bytes, KeySize::Bits256);

    engine.decrypt(&envelope.payload, &one_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asymmetric::test_keys::{second_keypair, shared_keypair};
    use mcrypt_core::config::SymmetricConfig;
    use mcrypt_core::Algorithm;

    fn fast_engine() -> SymmetricEngine {
        SymmetricEngine::new(&SymmetricConfig {
            timing_floor_ms: 0,
            allow_fallback: false,
        })
    }

    #[test]
    fn test_hybrid_roundtrip() {
        let engine = fast_engine();
        let pair = shared_keypair();
        let plaintext = b"hybrid encrypted payload, longer than an RSA block would allow \
                          because the bulk encryption is symmetric";

        let envelope = hybrid_encrypt(&engine, plaintext, pair.public(), None).unwrap();
        assert_eq!(envelope.payload.algorithm, Algorithm::Aes256Gcm);
        assert!(envelope.signature.is_none());

        let decrypted = hybrid_decrypt(&engine, &envelope, pair.private(), None).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn test_one_time_keys_not_reused() {
        let engine = fast_engine();
        let pair = shared_keypair();

        let e1 = hybrid_encrypt(&engine, b"same", pair.public(), None).unwrap();
        let e2 = hybrid_encrypt(&engine, b"same", pair.public(), None).unwrap();

        // Distinct wrapped keys and distinct payload key bindings
        assert_ne!(e1.encrypted_key, e2.encrypted_key);
        assert_ne!(e1.payload.key_hash, e2.payload.key_hash);
    }

    #[test]
    fn test_signed_roundtrip() {
        let engine = fast_engine();
        let recipient = shared_keypair();
        let signer = second_keypair();

        let envelope = hybrid_encrypt(
            &engine,
            b"signed payload",
            recipient.public(),
            Some(signer.private()),
        )
        .unwrap();
        assert!(envelope.signature.is_some());

        let decrypted = hybrid_decrypt(
            &engine,
            &envelope,
            recipient.private(),
            Some(signer.public()),
        )
        .unwrap();
        assert_eq!(decrypted, b"signed payload");
    }

    #[test]
    fn test_tampered_structural_field_fails_signature_first() {
        let engine = fast_engine();
        let recipient = shared_keypair();
        let signer = second_keypair();

        let mut envelope = hybrid_encrypt(
            &engine,
            b"payload",
            recipient.public(),
            Some(signer.private()),
        )
        .unwrap();
        envelope.encrypted_key[0] ^= 0x01;

        let err = hybrid_decrypt(
            &engine,
            &envelope,
            recipient.private(),
            Some(signer.public()),
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::SignatureVerification));
    }

    #[test]
    fn test_missing_signature_when_verification_requested() {
        let engine = fast_engine();
        let pair = shared_keypair();

        let envelope = hybrid_encrypt(&engine, b"unsigned", pair.public(), None).unwrap();
        let err = hybrid_decrypt(&engine, &envelope, pair.private(), Some(pair.public()))
            .unwrap_err();
        assert!(matches!(err, CryptoError::SignatureVerification));
    }

    #[test]
    fn test_wrong_recipient_key_fails() {
        let engine = fast_engine();
        let envelope =
            hybrid_encrypt(&engine, b"for someone else", shared_keypair().public(), None).unwrap();

        let err = hybrid_decrypt(&engine, &envelope, second_keypair().private(), None).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn test_json_roundtrip() {
        let engine = fast_engine();
        let pair = shared_keypair();

        let envelope = hybrid_encrypt(&engine, b"serialize me", pair.public(), None).unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"encryptedKey\""));

        let back: HybridEnvelope = serde_json::from_str(&json).unwrap();
        let decrypted = hybrid_decrypt(&engine, &back, pair.private(), None).unwrap();
        assert_eq!(decrypted, b"serialize me");
    }
}
