use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CryptoError;

/// Algorithm identifier carried by every envelope and container.
///
/// Parsed once, at the boundary where an envelope or metadata block is
/// deserialized; an unrecognized tag is rejected there with
/// [`CryptoError::UnsupportedAlgorithm`] instead of leaking a raw string
/// deeper into the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Aes128Gcm,
    Aes256Gcm,
    /// Non-authenticated fallback mode. Envelopes carry no auth tag; outer
    /// checksums (e.g. the file container) are the integrity layer.
    Aes128Ctr,
    Aes256Ctr,
    RsaOaep,
    /// RSA-wrapped one-time AES key around an AEAD payload.
    HybridRsaAes,
    /// Simulated post-quantum KEM (ML-KEM-768-shaped sizes).
    QsKem768,
    /// Simulated post-quantum signature scheme.
    QsDsa65,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes128Gcm => "AES-128-GCM",
            Algorithm::Aes256Gcm => "AES-256-GCM",
            Algorithm::Aes128Ctr => "AES-128-CTR",
            Algorithm::Aes256Ctr => "AES-256-CTR",
            Algorithm::RsaOaep => "RSA-OAEP",
            Algorithm::HybridRsaAes => "HYBRID-RSA-AES",
            Algorithm::QsKem768 => "QS-KEM-768",
            Algorithm::QsDsa65 => "QS-DSA-65",
        }
    }

    /// True for modes handled by the symmetric engine.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            Algorithm::Aes128Gcm
                | Algorithm::Aes256Gcm
                | Algorithm::Aes128Ctr
                | Algorithm::Aes256Ctr
        )
    }

    /// True for modes that produce an authentication tag.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Algorithm::Aes128Gcm | Algorithm::Aes256Gcm)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES-128-GCM" => Ok(Algorithm::Aes128Gcm),
            "AES-256-GCM" => Ok(Algorithm::Aes256Gcm),
            "AES-128-CTR" => Ok(Algorithm::Aes128Ctr),
            "AES-256-CTR" => Ok(Algorithm::Aes256Ctr),
            "RSA-OAEP" => Ok(Algorithm::RsaOaep),
            "HYBRID-RSA-AES" => Ok(Algorithm::HybridRsaAes),
            "QS-KEM-768" => Ok(Algorithm::QsKem768),
            "QS-DSA-65" => Ok(Algorithm::QsDsa65),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Symmetric key size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySize {
    Bits128,
    Bits256,
}

impl KeySize {
    pub fn bytes(&self) -> usize {
        match self {
            KeySize::Bits128 => 16,
            KeySize::Bits256 => 32,
        }
    }

    pub fn bits(&self) -> usize {
        self.bytes() * 8
    }
}

/// Digest selection for hashing and HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Standard,
    High,
    /// Protocol shape only; the underlying math carries no security property.
    Simulated,
}

/// Capability descriptor returned by `algorithm_info()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmInfo {
    pub algorithm: Algorithm,
    pub key_bits: usize,
    pub security_level: SecurityLevel,
    /// Explicitly true for the quantum-safe-styled family.
    pub simulated: bool,
    pub authenticated: bool,
}
