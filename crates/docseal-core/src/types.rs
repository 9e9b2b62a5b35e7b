use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Top-level storage partition for an encrypted blob.
///
/// Closed set: a typo can never create a new top-level directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageCategory {
    Documents,
    Images,
    Temp,
    Backups,
}

impl StorageCategory {
    pub const ALL: [StorageCategory; 4] = [
        StorageCategory::Documents,
        StorageCategory::Images,
        StorageCategory::Temp,
        StorageCategory::Backups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageCategory::Documents => "documents",
            StorageCategory::Images => "images",
            StorageCategory::Temp => "temp",
            StorageCategory::Backups => "backups",
        }
    }

    /// Partition chosen for an uploaded file of the given MIME type.
    pub fn for_mime_type(mime_type: &str) -> Self {
        if mime_type.trim().to_ascii_lowercase().starts_with("image/") {
            StorageCategory::Images
        } else {
            StorageCategory::Documents
        }
    }
}

impl fmt::Display for StorageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "documents" => Ok(StorageCategory::Documents),
            "images" => Ok(StorageCategory::Images),
            "temp" => Ok(StorageCategory::Temp),
            "backups" => Ok(StorageCategory::Backups),
            other => Err(format!("unknown storage category: {other}")),
        }
    }
}

/// Caller-supplied description of a file being stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub original_name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Plaintext file metadata. Only ever persisted inside an encrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    /// SHA-256 of the plaintext (hex)
    pub checksum: String,
    pub uploaded_by: String,
    /// Unix timestamp (seconds)
    pub uploaded_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Row kept by the persistence collaborator for every stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFilePointer {
    pub id: String,
    pub user_id: String,
    pub category: StorageCategory,
    /// Operator-relative path of the encrypted record
    pub path: String,
    /// SHA-256 of the plaintext (hex), checked on every read
    pub checksum: String,
    /// JSON-serialized metadata envelope
    pub metadata_envelope: String,
    pub size: u64,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub last_accessed_at: Option<u64>,
    #[serde(default)]
    pub access_count: u64,
}

/// Outward view of a stored file. Carries no key material or ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub category: StorageCategory,
    pub path: String,
    pub size: u64,
    pub checksum: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub last_accessed_at: Option<u64>,
    pub access_count: u64,
}

impl From<&StoredFilePointer> for FileRecord {
    fn from(p: &StoredFilePointer) -> Self {
        Self {
            id: p.id.clone(),
            owner_id: p.user_id.clone(),
            category: p.category,
            path: p.path.clone(),
            size: p.size,
            checksum: p.checksum.clone(),
            created_at: p.created_at,
            updated_at: p.updated_at,
            last_accessed_at: p.last_accessed_at,
            access_count: p.access_count,
        }
    }
}

/// Pagination and filtering for owner listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
    pub category: Option<StorageCategory>,
}

impl ListOptions {
    pub const MAX_LIMIT: usize = 100;

    /// Page and limit clamped to sane bounds.
    pub fn normalized(&self) -> (usize, usize) {
        let page = self.page.max(1);
        let limit = self.limit.clamp(1, Self::MAX_LIMIT);
        (page, limit)
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub files: Vec<T>,
    /// Total matching rows across all pages
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_files: u64,
    pub total_size: u64,
    pub by_category: BTreeMap<StorageCategory, CategoryStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub files: u64,
    pub size: u64,
}

impl StorageStats {
    pub fn record(&mut self, category: StorageCategory, size: u64) {
        self.total_files += 1;
        self.total_size += size;
        let entry = self.by_category.entry(category).or_default();
        entry.files += 1;
        entry.size += size;
    }
}

/// Current time as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
