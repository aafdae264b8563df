//! mcrypt-container: encrypted file containers and directory batches
//!
//! On-disk container layout (bit-exact):
//! ```text
//! [4 bytes: big-endian u32 metadataLength]
//! [metadataLength bytes: UTF-8 JSON metadata]
//! [remaining bytes: ciphertext]
//! ```
//!
//! Directory encryption mirrors the source tree into an output tree of
//! `.encrypted` containers and writes an `encryption-manifest.json` sidecar
//! recording per-file success/failure; one file's failure never aborts the
//! rest of the batch.

pub mod directory;
pub mod format;
pub mod manifest;

pub use directory::{decrypt_directory, encrypt_directory};
pub use format::{ContainerMetadata, DecryptMode, EncryptMode, FileCrypter, CONTAINER_VERSION};
pub use manifest::{DirectoryManifest, FileRecord, MANIFEST_NAME};
