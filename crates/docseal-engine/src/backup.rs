//! Password-protected backups of one owner's files.
//!
//! A backup is a single envelope in the `backups` category. Its plaintext is
//! a JSON manifest:
//!
//! ```text
//! {"version":1,"ownerId":"...","createdAt":...,
//!  "entries":[{"id":"...","metadata":{...},"content":"<base64>","checksum":"<hex>"}]}
//! ```
//!
//! The key is scrypt(password, fresh random salt); the salt travels in the
//! envelope. Master keys are not involved in the backup key, so a backup can
//! be restored under a different master key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docseal_core::{unix_now, FileMetadata, ListOptions, StorageCategory};
use docseal_crypto::{
    cipher, derive_from_password_strong, sha256_hex, CryptoError, Envelope, KeyDerivationMethod,
};
use docseal_storage::layout::{ensure_parent_dir, owner_prefix, resolve_path};
use opendal::ErrorKind;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::catalog::PointerCatalog;
use crate::error::{StoreError, StoreResult};
use crate::store::FileStore;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupManifest {
    version: u32,
    owner_id: String,
    created_at: u64,
    entries: Vec<BackupEntry>,
}

#[derive(Serialize, Deserialize)]
struct BackupEntry {
    id: String,
    metadata: FileMetadata,
    /// Plaintext, standard base64
    content: String,
    checksum: String,
}

impl Drop for BackupEntry {
    fn drop(&mut self) {
        self.content.zeroize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    /// Operator-relative path of the backup blob
    pub path: String,
    pub included: usize,
    /// Files that could not be read and were left out
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
    /// Entries whose id is already present for this owner
    pub skipped: usize,
    pub failed: usize,
}

pub struct BackupArchiver<'a, C> {
    store: &'a FileStore<C>,
}

impl<'a, C: PointerCatalog> BackupArchiver<'a, C> {
    pub fn new(store: &'a FileStore<C>) -> Self {
        Self { store }
    }

    /// Export every file of `owner_id` into one encrypted blob.
    ///
    /// Files that fail to decrypt or verify are logged and left out; the
    /// backup itself only fails on key derivation or write errors.
    pub async fn create_backup(
        &self,
        owner_id: &str,
        master_key: &SecretString,
        password: &SecretString,
    ) -> StoreResult<BackupReport> {
        let mut entries = Vec::new();
        let mut failed = 0;
        let mut page = 1;

        loop {
            let opts = ListOptions {
                page,
                limit: ListOptions::MAX_LIMIT,
                category: None,
            };
            let listing = self.store.catalog().list_by_owner(owner_id, &opts)?;
            let fetched = listing.files.len();

            for pointer in listing.files {
                match self.store.read_untracked(&pointer.id, owner_id, master_key).await {
                    Ok(file) => entries.push(BackupEntry {
                        id: pointer.id,
                        checksum: file.metadata.checksum.clone(),
                        content: STANDARD.encode(file.content.as_slice()),
                        metadata: file.metadata,
                    }),
                    Err(e) => {
                        warn!(file_id = %pointer.id, owner = %owner_id, "skipping file in backup: {e}");
                        failed += 1;
                    }
                }
            }

            if fetched == 0 || page * ListOptions::MAX_LIMIT >= listing.total {
                break;
            }
            page += 1;
        }

        let manifest = BackupManifest {
            version: MANIFEST_VERSION,
            owner_id: owner_id.to_string(),
            created_at: unix_now(),
            entries,
        };
        let included = manifest.entries.len();
        let plaintext = Zeroizing::new(serde_json::to_vec(&manifest)?);
        drop(manifest);

        let key = derive_from_password_strong(password, None, &self.store.kdf)?;
        let envelope = cipher::encrypt(&plaintext, &key)?;

        let backup_id = Uuid::new_v4().to_string();
        let path = resolve_path(owner_id, &backup_id, StorageCategory::Backups);
        ensure_parent_dir(&self.store.op, &path).await?;
        self.store.op.write(&path, envelope.to_json_bytes()?).await?;

        info!(owner = %owner_id, path = %path, included, failed, "backup written");
        Ok(BackupReport {
            path,
            included,
            failed,
        })
    }

    /// Paths of the backups stored for `owner_id`, sorted.
    pub async fn list_backups(&self, owner_id: &str) -> StoreResult<Vec<String>> {
        let prefix = owner_prefix(owner_id, StorageCategory::Backups);
        let entries = match self.store.op.list(&prefix).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.path().to_string())
            .filter(|path| path != &prefix && !path.ends_with('/'))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Re-insert every file of a backup for `owner_id`.
    ///
    /// A wrong password fails the whole restore with `Decryption`. Individual
    /// entries that fail their checksum or validation are logged and counted.
    /// File ids and upload timestamps are preserved.
    pub async fn restore_backup(
        &self,
        path: &str,
        owner_id: &str,
        master_key: &SecretString,
        password: &SecretString,
    ) -> StoreResult<RestoreReport> {
        let bytes = self.store.op.read(path).await?.to_vec();
        let envelope = Envelope::from_json(&bytes)?;
        if envelope.key_derivation_method != KeyDerivationMethod::Scrypt {
            return Err(CryptoError::MalformedEnvelope(
                "backup envelope must use scrypt key derivation".into(),
            )
            .into());
        }

        let key = derive_from_password_strong(password, Some(envelope.salt), &self.store.kdf)?;
        let plaintext = cipher::decrypt(&envelope, &key)?;
        let manifest: BackupManifest = serde_json::from_slice(&plaintext)?;
        drop(plaintext);

        if manifest.owner_id != owner_id {
            warn!(path = %path, owner = %owner_id, "backup belongs to another owner");
            return Err(StoreError::NotFoundOrDenied);
        }

        let mut report = RestoreReport::default();
        for entry in &manifest.entries {
            match self.restore_entry(entry, owner_id, master_key).await {
                Ok(true) => report.restored += 1,
                Ok(false) => {
                    info!(file_id = %entry.id, "already present, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(file_id = %entry.id, "failed to restore entry: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            path = %path,
            owner = %owner_id,
            restored = report.restored,
            skipped = report.skipped,
            failed = report.failed,
            "restore complete"
        );
        Ok(report)
    }

    /// Ok(false) when the id already exists for this owner.
    async fn restore_entry(
        &self,
        entry: &BackupEntry,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<bool> {
        let content = Zeroizing::new(
            STANDARD
                .decode(entry.content.as_bytes())
                .map_err(|e| CryptoError::MalformedEnvelope(format!("backup entry content: {e}")))?,
        );
        if entry.id != entry.metadata.id
            || sha256_hex(&content) != entry.checksum
            || entry.checksum != entry.metadata.checksum
        {
            return Err(StoreError::Integrity);
        }

        self.store.policy().validate(
            &entry.metadata.original_name,
            &entry.metadata.mime_type,
            content.len() as u64,
        )?;

        let _guard = self.store.lock_file(&entry.id).await;
        if self.store.lookup(&entry.id, owner_id).is_ok() {
            return Ok(false);
        }

        let metadata = FileMetadata {
            uploaded_by: owner_id.to_string(),
            size: content.len() as u64,
            ..entry.metadata.clone()
        };
        self.store
            .persist(&content, &metadata, owner_id, master_key)
            .await?;
        Ok(true)
    }
}

impl<C: PointerCatalog> FileStore<C> {
    pub fn archiver(&self) -> BackupArchiver<'_, C> {
        BackupArchiver::new(self)
    }
}
