//! Deterministic storage layout
//!
//! ```text
//! {category}/{sha256(userId)[0..8]}/{sha256(fileId)[0..16]}.enc
//! ```
//!
//! Hashing spreads blobs over many directories and keeps raw user and file
//! ids out of the filesystem.

use docseal_core::StorageCategory;
use opendal::Operator;
use sha2::{Digest, Sha256};

/// File extension of every encrypted blob
pub const BLOB_EXTENSION: &str = "enc";

const USER_SEGMENT_LEN: usize = 8;
const FILE_SEGMENT_LEN: usize = 16;

/// Operator-relative path of the blob for (user, file, category).
pub fn resolve_path(user_id: &str, file_id: &str, category: StorageCategory) -> String {
    let user_hash = hex::encode(Sha256::digest(user_id.as_bytes()));
    let file_hash = hex::encode(Sha256::digest(file_id.as_bytes()));
    format!(
        "{}/{}/{}.{}",
        category.as_str(),
        &user_hash[..USER_SEGMENT_LEN],
        &file_hash[..FILE_SEGMENT_LEN],
        BLOB_EXTENSION
    )
}

/// Listing prefix covering one user's blobs in a category.
pub fn owner_prefix(user_id: &str, category: StorageCategory) -> String {
    let user_hash = hex::encode(Sha256::digest(user_id.as_bytes()));
    format!("{}/{}/", category.as_str(), &user_hash[..USER_SEGMENT_LEN])
}

/// Listing prefix covering every blob in a category.
pub fn category_prefix(category: StorageCategory) -> String {
    format!("{}/", category.as_str())
}

/// Create the directory holding `path`. Safe to call when it already exists.
pub async fn ensure_parent_dir(op: &Operator, path: &str) -> opendal::Result<()> {
    let Some((parent, _)) = path.rsplit_once('/') else {
        return Ok(());
    };
    if !op.info().full_capability().create_dir {
        return Ok(());
    }
    op.create_dir(&format!("{parent}/")).await
}
