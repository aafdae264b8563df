//! Single-file container encryption/decryption
//!
//! The metadata block records the plaintext's SHA-256 checksum; decryption
//! verifies it after the cipher opens and refuses to write the output file
//! on a mismatch, so a corrupted container can never produce a silently
//! wrong result on disk.

use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use mcrypt_core::config::ContainerConfig;
use mcrypt_core::{Algorithm, CryptoError, CryptoResult};
use mcrypt_crypto::material::Key;
use mcrypt_crypto::symmetric::{Envelope, SymmetricEngine};
use mcrypt_crypto::{hybrid_decrypt, hybrid_encrypt, HybridEnvelope};

/// Container format version.
pub const CONTAINER_VERSION: u32 = 1;

/// Length-prefix size.
const PREFIX_LEN: usize = 4;

/// Metadata block embedded at the head of every container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMetadata {
    pub original_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub encryption_algorithm: Algorithm,
    /// ISO-8601 timestamp of encryption.
    pub timestamp: String,
    /// SHA-256 hex of the plaintext.
    pub checksum: String,
    pub version: u32,
}

/// Key material for encryption, chosen per call.
pub enum EncryptMode<'a> {
    Symmetric(&'a Key),
    /// Non-authenticated CTR mode; the container checksum is the only
    /// integrity layer. Requires an engine built with `allow_fallback`.
    SymmetricFallback(&'a Key),
    Hybrid {
        recipient: &'a RsaPublicKey,
        signer: Option<&'a RsaPrivateKey>,
    },
}

/// Key material for decryption, matching the container's recorded algorithm.
pub enum DecryptMode<'a> {
    Symmetric(&'a Key),
    Hybrid {
        private: &'a RsaPrivateKey,
        verifier: Option<&'a RsaPublicKey>,
    },
}

/// Encrypts and decrypts single files in the container format.
#[derive(Debug, Clone)]
pub struct FileCrypter {
    engine: SymmetricEngine,
    config: ContainerConfig,
}

impl FileCrypter {
    pub fn new(engine: SymmetricEngine, config: ContainerConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &SymmetricEngine {
        &self.engine
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Encrypt `src` into a container at `dst`.
    ///
    /// Fails atomically: the output file is written in one step after the
    /// whole container is assembled in memory.
    pub fn encrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        mode: &EncryptMode<'_>,
    ) -> CryptoResult<ContainerMetadata> {
        let plaintext = fs::read(src)?;
        let checksum = hex::encode(Sha256::digest(&plaintext));

        let (algorithm, ciphertext) = match mode {
            EncryptMode::Symmetric(key) => {
                let envelope = self.engine.encrypt(&plaintext, key)?;
                (envelope.algorithm, envelope.to_wire())
            }
            EncryptMode::SymmetricFallback(key) => {
                let envelope = self.engine.encrypt_fallback(&plaintext, key)?;
                (envelope.algorithm, envelope.to_wire())
            }
            EncryptMode::Hybrid { recipient, signer } => {
                let envelope = hybrid_encrypt(&self.engine, &plaintext, recipient, *signer)?;
                (Algorithm::HybridRsaAes, serde_json::to_vec(&envelope)?)
            }
        };

        let metadata = ContainerMetadata {
            original_name: src
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_type: src
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: plaintext.len() as u64,
            encryption_algorithm: algorithm,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checksum,
            version: CONTAINER_VERSION,
        };

        let container = assemble(&metadata, &ciphertext)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dst, container)?;

        debug!(
            src = %src.display(),
            dst = %dst.display(),
            algorithm = %metadata.encryption_algorithm,
            bytes = metadata.file_size,
            "encrypted container written"
        );
        Ok(metadata)
    }

    /// Decrypt a container at `src` into `dst`.
    ///
    /// The plaintext is held in memory until its checksum matches the
    /// recorded value; on `ChecksumMismatch` nothing is written.
    pub fn decrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        mode: &DecryptMode<'_>,
    ) -> CryptoResult<ContainerMetadata> {
        let container = fs::read(src)?;
        let (metadata, ciphertext) = parse(&container)?;

        // Algorithm dispatch happens here, once, at the parse boundary
        let plaintext = match metadata.encryption_algorithm {
            alg if alg.is_symmetric() => {
                let key = match mode {
                    DecryptMode::Symmetric(key) => key,
                    DecryptMode::Hybrid { .. } => {
                        return Err(CryptoError::KeyMismatch);
                    }
                };
                // The binary wire layout carries no key-hash binding; the
                // AEAD tag (or the checksum below, for fallback containers)
                // is the integrity gate here.
                let envelope = Envelope::from_wire(alg, ciphertext)?;
                self.engine.decrypt(&envelope, key)?
            }
            Algorithm::HybridRsaAes => {
                let (private, verifier) = match mode {
                    DecryptMode::Hybrid { private, verifier } => (*private, *verifier),
                    DecryptMode::Symmetric(_) => {
                        return Err(CryptoError::KeyMismatch);
                    }
                };
                let envelope: HybridEnvelope = serde_json::from_slice(ciphertext)?;
                hybrid_decrypt(&self.engine, &envelope, private, verifier)?
            }
            other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        };

        let checksum = hex::encode(Sha256::digest(&plaintext));
        if checksum != metadata.checksum {
            return Err(CryptoError::ChecksumMismatch);
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dst, &plaintext)?;

        debug!(
            src = %src.display(),
            dst = %dst.display(),
            bytes = plaintext.len(),
            "container decrypted"
        );
        Ok(metadata)
    }

    /// Read only the metadata block of a container.
    pub fn read_metadata(&self, path: &Path) -> CryptoResult<ContainerMetadata> {
        let container = fs::read(path)?;
        let (metadata, _) = parse(&container)?;
        Ok(metadata)
    }
}

/// Assemble `[prefix][metadata JSON][ciphertext]`.
fn assemble(metadata: &ContainerMetadata, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let metadata_json = serde_json::to_vec(metadata)?;
    let metadata_len = u32::try_from(metadata_json.len())
        .map_err(|_| CryptoError::FileFormat("metadata block exceeds u32 range".into()))?;

    let mut out = Vec::with_capacity(PREFIX_LEN + metadata_json.len() + ciphertext.len());
    out.extend_from_slice(&metadata_len.to_be_bytes());
    out.extend_from_slice(&metadata_json);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Parse a container, returning the metadata and a slice of the ciphertext.
fn parse(container: &[u8]) -> CryptoResult<(ContainerMetadata, &[u8])> {
    if container.len() < PREFIX_LEN {
        return Err(CryptoError::FileFormat(format!(
            "container too short for length prefix: {} bytes",
            container.len()
        )));
    }
    let mut prefix = [0u8; PREFIX_LEN];
    prefix.copy_from_slice(&container[..PREFIX_LEN]);
    let metadata_len = u32::from_be_bytes(prefix) as usize;

    let body = &container[PREFIX_LEN..];
    if metadata_len > body.len() {
        return Err(CryptoError::FileFormat(format!(
            "metadata length {metadata_len} exceeds container body {}",
            body.len()
        )));
    }

    let (metadata_json, ciphertext) = body.split_at(metadata_len);
    let metadata: ContainerMetadata = serde_json::from_slice(metadata_json)
        .map_err(|e| CryptoError::FileFormat(format!("metadata parse: {e}")))?;

    if metadata.version != CONTAINER_VERSION {
        return Err(CryptoError::FileFormat(format!(
            "unsupported container version {}",
            metadata.version
        )));
    }

    Ok((metadata, ciphertext))
}
