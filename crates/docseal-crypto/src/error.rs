use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Tag check failed. Deliberately silent about the cause.
    #[error("decryption failed: wrong key or corrupted data")]
    Decryption,

    #[error("encryption failed")]
    Encryption,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid KDF parameters: {0}")]
    InvalidParams(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key encoding error: {0}")]
    Key(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
