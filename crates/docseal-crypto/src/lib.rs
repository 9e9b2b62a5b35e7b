//! docseal-crypto: at-rest encryption for stored documents
//!
//! Pipeline: plaintext → SHA-256 checksum → per-document key → AES-256-GCM envelope
//!
//! Key hierarchy:
//! ```text
//! Master secret (per user, never stored by the engine)
//!   └── Document key: PBKDF2-HMAC-SHA256(documentId ":" master, salt = SHA-256(documentId))
//!       ├── Content envelope   (random 128-bit IV)
//!       └── Metadata envelope  (random 128-bit IV, same key)
//! Backup password
//!   └── Backup key: scrypt(password, random salt) → one envelope over the manifest
//! ```
//!
//! Records may carry an RSA-SHA256 signature over the ciphertext hashes, so
//! authenticity can be checked without decrypting.

pub mod cipher;
pub mod document;
pub mod error;
pub mod kdf;
pub mod signer;

pub use cipher::{decrypt, encrypt, CipherAlgorithm, Envelope};
pub use document::{
    assemble, decrypt_metadata, disassemble, DisassembledDocument, EncryptedDocumentRecord,
};
pub use error::{CryptoError, CryptoResult};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use kdf::{
    derive_document_key, derive_from_password, derive_from_password_strong, generate_salt,
    EncryptionKey, KdfParams, KeyDerivationMethod,
};
pub use signer::{
    generate_key_pair, public_key_from_pem, public_key_to_pem, sign, verify, DocumentKeyPair,
    SignaturePayload,
};

/// Size of a derived symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a key-derivation salt
pub const SALT_SIZE: usize = 32;

/// Size of an AES-GCM initialization vector as stored in envelopes (128-bit)
pub const IV_SIZE: usize = 16;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}
