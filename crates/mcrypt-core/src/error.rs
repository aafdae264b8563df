use thiserror::Error;
use uuid::Uuid;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error taxonomy for the encryption engine.
///
/// Integrity and format errors are never downgraded to best-effort results;
/// batch constructs (directory encryption, pool batches) report them per-item
/// instead of aborting the whole collection.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material does not match its carried integrity hash. Fatal: the
    /// operation aborts before any ciphertext is touched.
    #[error("key integrity check failed: key material does not match its integrity hash")]
    KeyIntegrity,

    /// The envelope's key-hash reference does not match the supplied key.
    #[error("envelope is bound to a different key than the one supplied")]
    KeyMismatch,

    /// AEAD tag mismatch or malformed ciphertext.
    #[error("decryption failed: authentication tag mismatch or malformed ciphertext")]
    Decryption,

    /// Unrecognized algorithm identifier in an envelope or container.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Asymmetric encryption size limit exceeded.
    #[error("plaintext too large for asymmetric encryption: {size} bytes (max {max})")]
    PlaintextTooLarge { size: usize, max: usize },

    /// A required signature did not verify.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Container length-prefix or layout parse failure.
    #[error("invalid container format: {0}")]
    FileFormat(String),

    /// Post-decryption plaintext checksum does not match the recorded value.
    #[error("checksum mismatch: decrypted data does not match recorded checksum")]
    ChecksumMismatch,

    /// A pool task exceeded its timeout. The worker slot is freed; a late
    /// result from the underlying computation is discarded.
    #[error("worker task {task_id} timed out after {timeout_secs}s")]
    WorkerTimeout { task_id: Uuid, timeout_secs: u64 },

    /// Worker pool infrastructure failure (closed channel, dropped reply).
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Structurally invalid key material (wrong length, below minimum size).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CryptoError {
    fn from(e: serde_json::Error) -> Self {
        CryptoError::Serialization(e.to_string())
    }
}
