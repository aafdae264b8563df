//! RSA engine: OAEP encryption, PSS signatures
//!
//! Encryption enforces the OAEP size bound (`k - 2*hLen - 2`) up front and
//! fails with `PlaintextTooLarge` instead of truncating. Signatures are
//! RSA-PSS over SHA-256 with a fresh OS RNG per signature.

use rand::rngs::OsRng;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use mcrypt_core::{CryptoError, CryptoResult};

/// Minimum accepted modulus size in bits.
pub const MIN_RSA_BITS: usize = 2048;

/// OAEP-SHA256 overhead in bytes (2*hLen + 2).
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// An RSA key pair. The private key embeds the public components; the
/// public half is precomputed for callers that hand it out separately.
#[derive(Clone)]
pub struct RsaKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaKeyPair {
    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.bits())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Generate an RSA key pair of at least [`MIN_RSA_BITS`].
pub fn generate_keypair(bits: usize) -> CryptoResult<RsaKeyPair> {
    if bits < MIN_RSA_BITS {
        return Err(CryptoError::InvalidKey(format!(
            "RSA modulus {bits} bits below minimum {MIN_RSA_BITS}"
        )));
    }
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::InvalidKey(format!("RSA key generation: {e}")))?;
    let public = RsaPublicKey::from(&private);
    debug!(bits, "RSA key pair generated");
    Ok(RsaKeyPair { private, public })
}

/// Maximum OAEP plaintext size for a public key.
pub fn max_plaintext_len(public: &RsaPublicKey) -> usize {
    public.size().saturating_sub(OAEP_OVERHEAD)
}

/// Encrypt with RSA-OAEP-SHA256.
pub fn encrypt(plaintext: &[u8], public: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    let max = max_plaintext_len(public);
    if plaintext.len() > max {
        return Err(CryptoError::PlaintextTooLarge {
            size: plaintext.len(),
            max,
        });
    }
    public
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|_| CryptoError::Decryption)
}

/// Decrypt with RSA-OAEP-SHA256.
pub fn decrypt(ciphertext: &[u8], private: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
    private
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Sign arbitrary bytes with RSA-PSS-SHA256.
pub fn sign(message: &[u8], private: &RsaPrivateKey) -> Vec<u8> {
    let signing_key = BlindedSigningKey::<Sha256>::new(private.clone());
    signing_key
        .sign_with_rng(&mut OsRng, message)
        .to_vec()
}

/// Verify an RSA-PSS-SHA256 signature. Returns false on any malformed or
/// non-verifying input; safe to call on untrusted bytes.
pub fn verify(message: &[u8], signature: &[u8], public: &RsaPublicKey) -> bool {
    let verifying_key = VerifyingKey::<Sha256>::new(public.clone());
    match Signature::try_from(signature) {
        Ok(sig) => verifying_key.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}
