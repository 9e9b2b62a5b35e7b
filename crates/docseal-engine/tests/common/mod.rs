#![allow(dead_code)]

use docseal_core::NewFile;
use docseal_crypto::KdfParams;
use docseal_engine::{FileStore, MemoryCatalog, ValidationPolicy};
use secrecy::SecretString;

/// Cheap parameters so tests don't spend seconds in PBKDF2 / scrypt.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        pbkdf2_iterations: 10,
        scrypt_log_n: 4,
        scrypt_r: 8,
        scrypt_p: 1,
    }
}

pub fn memory_store() -> FileStore<MemoryCatalog> {
    FileStore::new(
        docseal_storage::memory_operator().unwrap(),
        MemoryCatalog::new(),
        ValidationPolicy::default(),
        fast_kdf(),
    )
    .unwrap()
}

pub fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

pub fn new_file(name: &str, mime_type: &str) -> NewFile {
    NewFile {
        original_name: name.into(),
        mime_type: mime_type.into(),
        ..Default::default()
    }
}
