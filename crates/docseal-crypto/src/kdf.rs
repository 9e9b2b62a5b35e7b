//! Key derivation: password → symmetric key (PBKDF2 or scrypt), and
//! deterministic per-document keys from (documentId, master secret).

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// How the key behind an envelope was derived. Part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDerivationMethod {
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2Sha256,
    #[serde(rename = "scrypt")]
    Scrypt,
}

/// A derived 256-bit key plus the salt it was derived with.
///
/// Zeroized on drop to prevent secrets lingering in memory. Lives only for
/// the duration of one crypto operation.
pub struct EncryptionKey {
    key: [u8; KEY_SIZE],
    salt: [u8; SALT_SIZE],
    method: KeyDerivationMethod,
}

impl EncryptionKey {
    pub fn new(key: [u8; KEY_SIZE], salt: [u8; SALT_SIZE], method: KeyDerivationMethod) -> Self {
        Self { key, salt, method }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    pub fn method(&self) -> KeyDerivationMethod {
        self.method
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .field("method", &self.method)
            .finish()
    }
}

/// Cost parameters for every derivation.
///
/// Injected rather than global so tests can run with cheap settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA256 iterations (default: 100000)
    pub pbkdf2_iterations: u32,
    /// scrypt log2(N) (default: 14 → N = 16384)
    pub scrypt_log_n: u8,
    /// scrypt block size (default: 8)
    pub scrypt_r: u32,
    /// scrypt parallelism (default: 1)
    pub scrypt_p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            scrypt_log_n: 14,
            scrypt_r: 8,
            scrypt_p: 1,
        }
    }
}

impl KdfParams {
    /// Upper bound on scrypt working memory (32 MiB)
    pub const MAX_SCRYPT_MEMORY: u64 = 32 * 1024 * 1024;

    /// Fewest PBKDF2 rounds accepted from configuration
    pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

    /// Bytes of memory one scrypt derivation needs: 128 · r · N
    pub fn scrypt_memory(&self) -> u128 {
        128u128 * self.scrypt_r as u128 * (1u128 << self.scrypt_log_n.min(127))
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.pbkdf2_iterations == 0 {
            return Err(CryptoError::InvalidParams(
                "pbkdf2_iterations must be at least 1".into(),
            ));
        }
        if self.scrypt_log_n == 0 || self.scrypt_log_n >= 64 {
            return Err(CryptoError::InvalidParams(format!(
                "scrypt_log_n out of range: {}",
                self.scrypt_log_n
            )));
        }
        if self.scrypt_r == 0 || self.scrypt_p == 0 {
            return Err(CryptoError::InvalidParams(
                "scrypt_r and scrypt_p must be at least 1".into(),
            ));
        }
        if self.scrypt_memory() > Self::MAX_SCRYPT_MEMORY as u128 {
            return Err(CryptoError::InvalidParams(format!(
                "scrypt needs {} bytes, ceiling is {}",
                self.scrypt_memory(),
                Self::MAX_SCRYPT_MEMORY
            )));
        }
        Ok(())
    }

    /// `validate` plus the PBKDF2 work floor. Applied to parameters read
    /// from configuration; `FileStore::new` only runs `validate`.
    pub fn validate_production(&self) -> CryptoResult<()> {
        self.validate()?;
        if self.pbkdf2_iterations < Self::MIN_PBKDF2_ITERATIONS {
            return Err(CryptoError::InvalidParams(format!(
                "pbkdf2_iterations must be at least {}, got {}",
                Self::MIN_PBKDF2_ITERATIONS,
                self.pbkdf2_iterations
            )));
        }
        Ok(())
    }
}

/// Fresh random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a key from a password with PBKDF2-HMAC-SHA256.
///
/// A random salt is generated when none is given; the returned key carries
/// whichever salt was used.
pub fn derive_from_password(
    password: &SecretString,
    salt: Option<[u8; SALT_SIZE]>,
    params: &KdfParams,
) -> CryptoResult<EncryptionKey> {
    params.validate()?;
    let salt = salt.unwrap_or_else(generate_salt);
    Ok(pbkdf2_key(
        password.expose_secret().as_bytes(),
        salt,
        params.pbkdf2_iterations,
    ))
}

/// Derive a key from a password with scrypt. Slower and memory-hard; used
/// for backups.
pub fn derive_from_password_strong(
    password: &SecretString,
    salt: Option<[u8; SALT_SIZE]>,
    params: &KdfParams,
) -> CryptoResult<EncryptionKey> {
    params.validate()?;
    let salt = salt.unwrap_or_else(generate_salt);

    let scrypt_params =
        scrypt::Params::new(params.scrypt_log_n, params.scrypt_r, params.scrypt_p, KEY_SIZE)
            .map_err(|e| CryptoError::InvalidParams(format!("scrypt: {e}")))?;

    let mut key = [0u8; KEY_SIZE];
    scrypt::scrypt(
        password.expose_secret().as_bytes(),
        &salt,
        &scrypt_params,
        &mut key,
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("scrypt: {e}")))?;

    Ok(EncryptionKey::new(key, salt, KeyDerivationMethod::Scrypt))
}

/// Derive the key for one document.
///
/// `salt = SHA-256(documentId)`, `key = PBKDF2(documentId ":" master, salt)`.
/// Deterministic, so the key is never stored anywhere.
pub fn derive_document_key(
    document_id: &str,
    master_key: &SecretString,
    params: &KdfParams,
) -> CryptoResult<EncryptionKey> {
    params.validate()?;
    let salt: [u8; SALT_SIZE] = Sha256::digest(document_id.as_bytes()).into();

    let mut input = Zeroizing::new(Vec::with_capacity(
        document_id.len() + 1 + master_key.expose_secret().len(),
    ));
    input.extend_from_slice(document_id.as_bytes());
    input.push(b':');
    input.extend_from_slice(master_key.expose_secret().as_bytes());

    Ok(pbkdf2_key(&input, salt, params.pbkdf2_iterations))
}

fn pbkdf2_key(password: &[u8], salt: [u8; SALT_SIZE], iterations: u32) -> EncryptionKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, &salt, iterations, &mut key);
    EncryptionKey::new(key, salt, KeyDerivationMethod::Pbkdf2Sha256)
}
