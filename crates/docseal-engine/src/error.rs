use docseal_core::DocsealError;
use docseal_crypto::CryptoError;
use std::fmt;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Upload rejected by the validation policy. Nothing was encrypted or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("unsupported MIME type: {0}")]
    UnsupportedType(String),

    #[error("forbidden file extension: .{0}")]
    ForbiddenExtension(String),

    #[error("invalid file name: {0:?}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication tag mismatch or an envelope that does not parse. Wrong
    /// key, tampered bytes and a rewritten algorithm tag all look the same.
    #[error("decryption failed")]
    Decryption,

    /// GCM authentication passed but the plaintext checksum disagrees with the
    /// recorded one. Corruption and tampering are indistinguishable here.
    #[error("file integrity check failed")]
    Integrity,

    #[error("storage I/O error: {0}")]
    Storage(#[from] opendal::Error),

    /// Ownership-scoped lookup found nothing: absent or owned by someone else.
    #[error("file not found or access denied")]
    NotFoundOrDenied,

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("catalog error: {0}")]
    Catalog(#[from] DocsealError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for StoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Decryption | CryptoError::MalformedEnvelope(_) => StoreError::Decryption,
            other => StoreError::Crypto(other),
        }
    }
}

/// Where a store operation ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    Validating,
    Encrypting,
    Persisting,
    Stored,
    Rejected,
    Failed,
}

impl StoreStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StoreStage::Stored | StoreStage::Rejected | StoreStage::Failed
        )
    }
}

impl fmt::Display for StoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreStage::Validating => "validating",
            StoreStage::Encrypting => "encrypting",
            StoreStage::Persisting => "persisting",
            StoreStage::Stored => "stored",
            StoreStage::Rejected => "rejected",
            StoreStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl StoreError {
    /// Terminal state for an operation that failed with this error.
    pub fn stage(&self) -> StoreStage {
        match self {
            StoreError::Validation(_) => StoreStage::Rejected,
            _ => StoreStage::Failed,
        }
    }

    /// Generic message safe to show end users. Never includes crypto detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            StoreError::Validation(ValidationError::TooLarge { .. }) => "file too large",
            StoreError::Validation(
                ValidationError::UnsupportedType(_) | ValidationError::ForbiddenExtension(_),
            ) => "unsupported type",
            StoreError::Validation(_) => "invalid file",
            StoreError::NotFoundOrDenied => "not found",
            StoreError::Decryption => "access denied",
            _ => "processing failed",
        }
    }
}
