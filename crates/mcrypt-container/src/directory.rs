//! Directory encryption/decryption
//!
//! Walks the input tree recursively, keeping files whose extension is on
//! the allow-list and skipping dot-directories and configured package/build
//! directories. Each file becomes a container in a mirrored output tree
//! with the configured suffix. A file's failure is recorded in the manifest
//! and does not abort the remaining files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use mcrypt_core::{Algorithm, CryptoError, CryptoResult, KeySize};

use crate::format::{DecryptMode, EncryptMode, FileCrypter};
use crate::manifest::{DirectoryManifest, FileRecord};

/// Encrypt every allow-listed file under `input_dir` into `output_dir`,
/// returning (and persisting) the batch manifest.
pub fn encrypt_directory(
    crypter: &FileCrypter,
    input_dir: &Path,
    output_dir: &Path,
    mode: &EncryptMode<'_>,
) -> CryptoResult<DirectoryManifest> {
    if !input_dir.is_dir() {
        return Err(CryptoError::FileFormat(format!(
            "not a directory: {}",
            input_dir.display()
        )));
    }
    fs::create_dir_all(output_dir)?;

    let sources = collect_files(crypter, input_dir)?;
    let suffix = &crypter.config().output_suffix;
    let mut records = Vec::with_capacity(sources.len());

    for src in &sources {
        let rel = src
            .strip_prefix(input_dir)
            .map_err(|e| CryptoError::FileFormat(format!("path outside input tree: {e}")))?;
        let mut dst = output_dir.join(rel);
        dst.set_file_name(format!(
            "{}{}",
            dst.file_name().unwrap_or_default().to_string_lossy(),
            suffix
        ));

        let original_size = fs::metadata(src).map(|m| m.len()).unwrap_or(0);
        match crypter.encrypt_file(src, &dst, mode) {
            Ok(metadata) => {
                let encrypted_size = fs::metadata(&dst).map(|m| m.len()).unwrap_or(0);
                records.push(FileRecord {
                    original_path: src.display().to_string(),
                    encrypted_path: dst.display().to_string(),
                    metadata: Some(metadata),
                    error: None,
                    original_size,
                    encrypted_size,
                });
            }
            Err(e) => {
                warn!(src = %src.display(), error = %e, "file encryption failed; continuing");
                records.push(FileRecord {
                    original_path: src.display().to_string(),
                    encrypted_path: dst.display().to_string(),
                    metadata: None,
                    error: Some(e.to_string()),
                    original_size,
                    encrypted_size: 0,
                });
            }
        }
    }

    let algorithm = match mode {
        EncryptMode::Symmetric(key) => key.algorithm(),
        EncryptMode::SymmetricFallback(key) => match key.size() {
            KeySize::Bits128 => Algorithm::Aes128Ctr,
            KeySize::Bits256 => Algorithm::Aes256Ctr,
        },
        EncryptMode::Hybrid { .. } => Algorithm::HybridRsaAes,
    };
    let manifest = DirectoryManifest::new(input_dir, output_dir, algorithm, records);
    manifest.save(output_dir)?;

    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        total = manifest.total_files,
        failed = manifest.failed_files,
        "directory encrypted"
    );
    Ok(manifest)
}

/// Decrypt the containers recorded in `encrypted_dir`'s manifest into
/// `output_dir`, reporting per-file outcomes in the returned manifest.
pub fn decrypt_directory(
    crypter: &FileCrypter,
    encrypted_dir: &Path,
    output_dir: &Path,
    mode: &DecryptMode<'_>,
) -> CryptoResult<DirectoryManifest> {
    let manifest = DirectoryManifest::load(encrypted_dir)?;
    fs::create_dir_all(output_dir)?;

    let suffix = &crypter.config().output_suffix;
    let mut records = Vec::new();

    for record in manifest.files.iter().filter(|r| r.succeeded()) {
        let src = PathBuf::from(&record.encrypted_path);
        let rel = match src.strip_prefix(&manifest.output_directory) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => PathBuf::from(src.file_name().unwrap_or_default()),
        };

        // Strip the container suffix to recover the original name
        let mut dst = output_dir.join(&rel);
        let name = dst.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
            dst.set_file_name(stripped);
        }

        let encrypted_size = fs::metadata(&src).map(|m| m.len()).unwrap_or(0);
        match crypter.decrypt_file(&src, &dst, mode) {
            Ok(metadata) => {
                debug!(src = %src.display(), dst = %dst.display(), "container restored");
                records.push(FileRecord {
                    original_path: dst.display().to_string(),
                    encrypted_path: src.display().to_string(),
                    original_size: metadata.file_size,
                    metadata: Some(metadata),
                    error: None,
                    encrypted_size,
                });
            }
            Err(e) => {
                warn!(src = %src.display(), error = %e, "container decryption failed; continuing");
                records.push(FileRecord {
                    original_path: dst.display().to_string(),
                    encrypted_path: src.display().to_string(),
                    metadata: None,
                    error: Some(e.to_string()),
                    original_size: 0,
                    encrypted_size,
                });
            }
        }
    }

    Ok(DirectoryManifest::new(
        encrypted_dir,
        output_dir,
        manifest.encryption_algorithm,
        records,
    ))
}

/// Recursively collect files whose extension is on the allow-list,
/// skipping dot-directories and configured skip directories.
fn collect_files(crypter: &FileCrypter, dir: &Path) -> CryptoResult<Vec<PathBuf>> {
    let config = crypter.config();
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if path.is_dir() {
                if name.starts_with('.') || config.skip_dirs.contains(&name) {
                    debug!(dir = %path.display(), "skipping directory");
                    continue;
                }
                stack.push(path);
            } else if path.is_file() {
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                if config.extensions.iter().any(|allowed| allowed == &ext) {
                    out.push(path);
                }
            }
        }
    }

    out.sort();
    Ok(out)
}
