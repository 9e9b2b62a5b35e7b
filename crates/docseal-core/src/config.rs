use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocsealError, DocsealResult};

/// Top-level engine configuration (loaded from docseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsealConfig {
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
    pub crypto: CryptoConfig,
    pub catalog: CatalogConfig,
    pub log: LogConfig,
}

impl DocsealConfig {
    /// Load from a TOML file. A missing file yields the defaults; callers
    /// decide whether that deserves a warning once logging is up.
    pub fn load(path: &Path) -> DocsealResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| DocsealError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> DocsealResult<Self> {
        toml::from_str(content).map_err(|e| DocsealError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Blob backend: "fs" or "memory"
    pub backend: String,
    /// Fixed root under which every category partition lives
    pub root: PathBuf,
}

/// Upload policy handed to the engine's validation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum plaintext size in bytes (default: 50 MiB)
    pub max_file_size: u64,
    /// MIME types accepted for upload
    pub allowed_mime_types: Vec<String>,
    /// File extensions rejected regardless of MIME type (no leading dot)
    pub forbidden_extensions: Vec<String>,
}

/// Key-derivation cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations (default: 100000)
    pub pbkdf2_iterations: u32,
    /// scrypt log2(N) (default: 14)
    pub scrypt_log_n: u8,
    /// scrypt block size r (default: 8)
    pub scrypt_r: u32,
    /// scrypt parallelism p (default: 1)
    pub scrypt_p: u32,
    /// PEM file holding the RSA private key used to sign records
    pub signing_key: Option<PathBuf>,
    /// PEM file holding the RSA public key used to verify records
    pub verifying_key: Option<PathBuf>,
}

/// Pointer catalog used by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog file path
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "fs".into(),
            root: PathBuf::from("./storage"),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_mime_types: [
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/vnd.ms-powerpoint",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/json",
                "text/plain",
                "text/csv",
                "text/markdown",
                "image/png",
                "image/jpeg",
                "image/gif",
                "image/webp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            forbidden_extensions: [
                "exe", "bat", "cmd", "com", "scr", "js", "vbs", "msi", "dll", "sh", "ps1", "jar",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            scrypt_log_n: 14,
            scrypt_r: 8,
            scrypt_p: 1,
            signing_key: None,
            verifying_key: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./storage/catalog.json"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
