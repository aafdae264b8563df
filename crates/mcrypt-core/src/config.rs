use serde::{Deserialize, Serialize};

/// Top-level engine configuration (loaded from multicrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kdf: KdfConfig,
    pub symmetric: SymmetricConfig,
    pub container: ContainerConfig,
    pub pool: PoolConfig,
}

/// Password-based key derivation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 200000, floor: 100000)
    pub iterations: u32,
    /// Salt length in bytes (default: 16)
    pub salt_len: usize,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: 200_000,
            salt_len: 16,
        }
    }
}

/// Symmetric engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymmetricConfig {
    /// Minimum wall-clock duration for every decrypt call in milliseconds,
    /// success and failure alike (default: 5)
    pub timing_floor_ms: u64,
    /// Permit encrypting in the non-authenticated CTR fallback mode
    /// (default: false; decryption of fallback envelopes is always allowed)
    pub allow_fallback: bool,
}

impl Default for SymmetricConfig {
    fn default() -> Self {
        Self {
            timing_floor_ms: 5,
            allow_fallback: false,
        }
    }
}

/// File container and directory batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Extension allow-list for directory encryption (no leading dot)
    pub extensions: Vec<String>,
    /// Suffix appended to encrypted file names (default: ".encrypted")
    pub output_suffix: String,
    /// Directory names skipped during traversal, in addition to
    /// dot-directories
    pub skip_dirs: Vec<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            extensions: [
                "txt", "md", "json", "csv", "xml", "yaml", "yml", "pdf", "doc", "docx", "xls",
                "xlsx", "png", "jpg", "jpeg", "gif", "db", "sql", "log",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            output_suffix: ".encrypted".into(),
            skip_dirs: ["node_modules", "target", "build", "dist", "__pycache__"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker count (0 = available parallelism)
    pub workers: usize,
    /// Per-task timeout in seconds (default: 30)
    pub task_timeout_secs: u64,
    /// Bound of each worker's dispatch queue (default: 64)
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            task_timeout_secs: 30,
            queue_depth: 64,
        }
    }
}
