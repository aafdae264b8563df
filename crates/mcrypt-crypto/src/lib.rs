//! mcrypt-crypto: the multicrypt encryption engines
//!
//! Engine layering (leaves first):
//! ```text
//! material  — key/IV/salt generation, PBKDF2 derivation, hash/HMAC,
//!             constant-time comparison
//!   ├── symmetric   — AES-GCM AEAD (CTR fallback), key-integrity binding,
//!   │                 timing-normalized decryption
//!   ├── asymmetric  — RSA-OAEP encrypt/decrypt, RSA-PSS sign/verify
//!   │     └── certificate — self-signed record issue/verify
//!   ├── hybrid      — RSA-wrapped one-time AES key around an AEAD payload
//!   └── kem/signing — quantum-safe-styled envelope (simulated primitives)
//! ```
//!
//! The kem/signing modules preserve the protocol shape of a KEM + signature
//! scheme with hash-based placeholders; they carry no post-quantum security
//! property and report `simulated: true` through the capability descriptor.

pub mod asymmetric;
pub mod certificate;
pub mod hybrid;
pub mod kem;
pub mod material;
pub mod signing;
pub mod symmetric;

pub use asymmetric::{generate_keypair, RsaKeyPair};
pub use certificate::{issue_self_signed, verify_certificate, Certificate, CertificateInfo};
pub use hybrid::{hybrid_decrypt, hybrid_encrypt, HybridEnvelope};
pub use kem::{decapsulate, encapsulate, generate_kem_keypair, open, seal, KemKeyPair, SealedBox};
pub use material::{
    constant_time_eq, derive_key_from_password, generate_iv, generate_salt, hash, hmac_tag, Key,
};
pub use signing::{generate_signature_keypair, sign, verify, SigKeyPair};
pub use symmetric::{Envelope, SymmetricEngine};

/// Size of a 256-bit symmetric key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-CTR initialization vector (128-bit, fallback mode)
pub const IV_SIZE: usize = 16;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Associated data bound into every AEAD operation
pub const AAD_TAG: &[u8] = b"multicrypt.aead.v1";
