//! Directory encryption manifest
//!
//! Written as `encryption-manifest.json` beside the encrypted tree and
//! consumed by directory decryption to know which containers to open and
//! where outputs belong.

use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use mcrypt_core::{Algorithm, CryptoError, CryptoResult};

use crate::format::ContainerMetadata;

/// Sidecar file name.
pub const MANIFEST_NAME: &str = "encryption-manifest.json";

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Per-file outcome of a directory batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub original_path: String,
    pub encrypted_path: String,
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContainerMetadata>,
    /// Present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub original_size: u64,
    pub encrypted_size: u64,
}

impl FileRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate record of a directory batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryManifest {
    pub version: u32,
    pub timestamp: String,
    pub input_directory: String,
    pub output_directory: String,
    pub total_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub total_original_size: u64,
    pub total_encrypted_size: u64,
    /// Encrypted-to-original size ratio (0.0 when nothing was processed).
    pub compression_ratio: f64,
    pub encryption_algorithm: Algorithm,
    pub files: Vec<FileRecord>,
}

impl DirectoryManifest {
    pub fn new(
        input_directory: &Path,
        output_directory: &Path,
        encryption_algorithm: Algorithm,
        files: Vec<FileRecord>,
    ) -> Self {
        let successful_files = files.iter().filter(|f| f.succeeded()).count() as u64;
        let failed_files = files.len() as u64 - successful_files;
        let total_original_size: u64 = files.iter().map(|f| f.original_size).sum();
        let total_encrypted_size: u64 = files.iter().map(|f| f.encrypted_size).sum();
        let compression_ratio = if total_original_size > 0 {
            total_encrypted_size as f64 / total_original_size as f64
        } else {
            0.0
        };

        Self {
            version: MANIFEST_VERSION,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            input_directory: input_directory.display().to_string(),
            output_directory: output_directory.display().to_string(),
            total_files: files.len() as u64,
            successful_files,
            failed_files,
            total_original_size,
            total_encrypted_size,
            compression_ratio,
            encryption_algorithm,
            files,
        }
    }

    /// Persist beside the encrypted tree.
    pub fn save(&self, output_directory: &Path) -> CryptoResult<()> {
        let path = output_directory.join(MANIFEST_NAME);
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load from an encrypted tree.
    pub fn load(output_directory: &Path) -> CryptoResult<Self> {
        let path = output_directory.join(MANIFEST_NAME);
        let bytes = fs::read(&path).map_err(|e| {
            CryptoError::FileFormat(format!("manifest {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CryptoError::FileFormat(format!("manifest parse: {e}")))
    }
}
