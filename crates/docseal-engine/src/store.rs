//! FileStore: validate → encrypt → persist, and fetch → decrypt → verify.
//!
//! Each stored file is one `EncryptedDocumentRecord` JSON blob at the path
//! `layout::resolve_path` gives for (owner, fileId, category), plus one
//! pointer row in the catalog. The pointer is authoritative: it is written
//! last on store and removed last on delete, so a crash can leave an orphaned
//! blob but never a pointer to missing bytes.
//!
//! Key derivation and AES-GCM run inline on the calling task. They are
//! CPU-bound and not cancelable; callers that need responsiveness should
//! drive the store from a dedicated runtime or blocking pool.

use docseal_core::config::CryptoConfig;
use docseal_core::{
    unix_now, FileMetadata, FileRecord, ListOptions, ListPage, NewFile, StorageCategory,
    StorageStats, StoredFilePointer,
};
use docseal_crypto::{
    document, sha256_hex, DisassembledDocument, DocumentKeyPair, EncryptedDocumentRecord,
    Envelope, KdfParams, RsaPublicKey,
};
use docseal_storage::layout::{category_prefix, ensure_parent_dir, resolve_path};
use opendal::{ErrorKind, Operator};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::catalog::PointerCatalog;
use crate::error::{StoreError, StoreResult, StoreStage};
use crate::locks::FileLocks;
use crate::validation::ValidationPolicy;

/// Plaintext handed back by `retrieve`. Content is zeroed on drop.
pub struct RetrievedFile {
    pub content: Zeroizing<Vec<u8>>,
    pub metadata: FileMetadata,
    /// True only for a signed record that verified against the configured key
    pub verified: bool,
}

impl std::fmt::Debug for RetrievedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievedFile")
            .field("content", &format_args!("[{} bytes]", self.content.len()))
            .field("metadata", &self.metadata)
            .field("verified", &self.verified)
            .finish()
    }
}

/// Result of an orphan sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Blobs found under the swept categories
    pub scanned: usize,
    /// Unreferenced blobs deleted
    pub removed: usize,
    /// Unreferenced blobs that could not be deleted
    pub failed: usize,
}

/// Cost parameters for key derivation, taken from `[crypto]`.
///
/// Fails when `pbkdf2_iterations` is below `KdfParams::MIN_PBKDF2_ITERATIONS`.
pub fn kdf_params(cfg: &CryptoConfig) -> StoreResult<KdfParams> {
    let params = KdfParams {
        pbkdf2_iterations: cfg.pbkdf2_iterations,
        scrypt_log_n: cfg.scrypt_log_n,
        scrypt_r: cfg.scrypt_r,
        scrypt_p: cfg.scrypt_p,
    };
    params.validate_production()?;
    Ok(params)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessStats {
    Record,
    Skip,
}

pub struct FileStore<C> {
    pub(crate) op: Operator,
    catalog: C,
    policy: ValidationPolicy,
    pub(crate) kdf: KdfParams,
    signing_key: Option<DocumentKeyPair>,
    verifying_key: Option<RsaPublicKey>,
    locks: FileLocks,
}

impl<C: PointerCatalog> FileStore<C> {
    /// Rejects KDF parameters that are unusable or over the scrypt memory
    /// ceiling.
    pub fn new(
        op: Operator,
        catalog: C,
        policy: ValidationPolicy,
        kdf: KdfParams,
    ) -> StoreResult<Self> {
        kdf.validate()?;
        Ok(Self {
            op,
            catalog,
            policy,
            kdf,
            signing_key: None,
            verifying_key: None,
            locks: FileLocks::new(),
        })
    }

    /// Sign every stored record and verify with the matching public key.
    pub fn with_signing_key(mut self, pair: DocumentKeyPair) -> Self {
        self.verifying_key = Some(pair.public_key().clone());
        self.signing_key = Some(pair);
        self
    }

    /// Verify signatures with this key (overrides the signing pair's own).
    pub fn with_verifying_key(mut self, key: RsaPublicKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validate, encrypt and persist a new file owned by `owner_id`.
    ///
    /// `buffer` is taken by value and zeroed on every exit path.
    pub async fn store(
        &self,
        buffer: Vec<u8>,
        file: NewFile,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<FileRecord> {
        let buffer = Zeroizing::new(buffer);
        debug!(owner = %owner_id, name = %file.original_name, stage = %StoreStage::Validating, "store");

        if let Err(e) = self
            .policy
            .validate(&file.original_name, &file.mime_type, buffer.len() as u64)
        {
            warn!(owner = %owner_id, stage = %StoreStage::Rejected, "upload rejected: {e}");
            return Err(e.into());
        }

        let metadata = FileMetadata {
            id: Uuid::new_v4().to_string(),
            original_name: file.original_name,
            mime_type: file.mime_type,
            size: buffer.len() as u64,
            checksum: sha256_hex(&buffer),
            uploaded_by: owner_id.to_string(),
            uploaded_at: unix_now(),
            tags: file.tags,
            description: file.description,
        };

        self.persist(&buffer, &metadata, owner_id, master_key).await
    }

    /// Encrypt and write `content` under `metadata.id`, then hand the pointer
    /// to the catalog. Shared by `store` and backup restore.
    pub(crate) async fn persist(
        &self,
        content: &[u8],
        metadata: &FileMetadata,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<FileRecord> {
        let file_id = metadata.id.as_str();
        let category = StorageCategory::for_mime_type(&metadata.mime_type);
        let path = resolve_path(owner_id, file_id, category);

        debug!(file_id = %file_id, stage = %StoreStage::Encrypting, "store");
        let record = document::assemble(
            file_id,
            content,
            metadata,
            master_key,
            self.signing_key.as_ref().map(|k| k.private_key()),
            &self.kdf,
        )
        .inspect_err(|e| warn!(file_id = %file_id, stage = %StoreStage::Failed, "encryption failed: {e}"))?;

        debug!(file_id = %file_id, path = %path, stage = %StoreStage::Persisting, "store");
        let bytes = record.to_json_bytes()?;
        ensure_parent_dir(&self.op, &path).await?;
        self.op.write(&path, bytes).await.inspect_err(
            |e| warn!(file_id = %file_id, path = %path, stage = %StoreStage::Failed, "write failed: {e}"),
        )?;

        let pointer = StoredFilePointer {
            id: file_id.to_string(),
            user_id: owner_id.to_string(),
            category,
            path: path.clone(),
            checksum: metadata.checksum.clone(),
            metadata_envelope: record.encrypted_metadata.to_json()?,
            size: metadata.size,
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_accessed_at: None,
            access_count: 0,
        };

        if let Err(e) = self.catalog.create(pointer.clone()) {
            warn!(file_id = %file_id, stage = %StoreStage::Failed, "catalog insert failed: {e}");
            if let Err(unlink) = self.op.delete(&path).await {
                warn!(path = %path, "failed to remove unreferenced blob: {unlink}");
            }
            return Err(e.into());
        }

        info!(
            file_id = %file_id,
            owner = %owner_id,
            category = %category,
            size = metadata.size,
            signed = record.signature.is_some(),
            stage = %StoreStage::Stored,
            "stored file"
        );
        Ok(FileRecord::from(&pointer))
    }

    /// Decrypt a file for its owner and check it against the recorded
    /// checksum before returning any bytes.
    pub async fn retrieve(
        &self,
        file_id: &str,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<RetrievedFile> {
        self.read_file(file_id, owner_id, master_key, AccessStats::Record)
            .await
    }

    /// `retrieve` without touching `accessCount`/`lastAccessedAt`. Used when
    /// exporting files for backup.
    pub(crate) async fn read_untracked(
        &self,
        file_id: &str,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<RetrievedFile> {
        self.read_file(file_id, owner_id, master_key, AccessStats::Skip)
            .await
    }

    async fn read_file(
        &self,
        file_id: &str,
        owner_id: &str,
        master_key: &SecretString,
        stats: AccessStats,
    ) -> StoreResult<RetrievedFile> {
        let _guard = self.locks.lock(file_id).await;
        let pointer = self.lookup(file_id, owner_id)?;

        let bytes = self.op.read(&pointer.path).await?.to_vec();
        let record = EncryptedDocumentRecord::from_json(&bytes)?;
        if record.id != pointer.id {
            warn!(file_id = %file_id, "record id does not match pointer");
            return Err(StoreError::Integrity);
        }

        let doc: DisassembledDocument<FileMetadata> = document::disassemble(
            &record,
            master_key,
            self.verifying_key.as_ref(),
            &self.kdf,
        )
        .inspect_err(|e| debug!(file_id = %file_id, "decrypt failed: {e}"))?;

        let actual = sha256_hex(&doc.content);
        if actual != pointer.checksum || doc.metadata.checksum != pointer.checksum {
            warn!(file_id = %file_id, "checksum mismatch on read");
            return Err(StoreError::Integrity);
        }

        if stats == AccessStats::Record {
            if let Err(e) = self.catalog.update_access_stats(file_id) {
                warn!(file_id = %file_id, "failed to update access stats: {e}");
            }
        }

        debug!(file_id = %file_id, verified = doc.verified, "retrieved file");
        Ok(RetrievedFile {
            content: doc.content,
            metadata: doc.metadata,
            verified: doc.verified,
        })
    }

    /// Decrypt only the metadata envelope held on the pointer. The blob is
    /// not read.
    pub async fn metadata(
        &self,
        file_id: &str,
        owner_id: &str,
        master_key: &SecretString,
    ) -> StoreResult<FileMetadata> {
        let pointer = self.lookup(file_id, owner_id)?;
        let envelope = Envelope::from_json(pointer.metadata_envelope.as_bytes())?;
        let metadata: FileMetadata =
            document::decrypt_metadata(file_id, &envelope, master_key, &self.kdf)?;
        if metadata.checksum != pointer.checksum || metadata.id != pointer.id {
            warn!(file_id = %file_id, "metadata does not match pointer");
            return Err(StoreError::Integrity);
        }
        Ok(metadata)
    }

    /// Remove a file. Blob first (best-effort), pointer last.
    pub async fn delete(&self, file_id: &str, owner_id: &str) -> StoreResult<()> {
        let _guard = self.locks.lock(file_id).await;
        let pointer = self.lookup(file_id, owner_id)?;

        if let Err(e) = self.op.delete(&pointer.path).await {
            warn!(file_id = %file_id, path = %pointer.path, "failed to delete blob, continuing: {e}");
        }
        self.catalog.delete_by_id(file_id)?;

        info!(file_id = %file_id, owner = %owner_id, "deleted file");
        Ok(())
    }

    pub async fn list(&self, owner_id: &str, opts: &ListOptions) -> StoreResult<ListPage<FileRecord>> {
        let page = self.catalog.list_by_owner(owner_id, opts)?;
        Ok(ListPage {
            files: page.files.iter().map(FileRecord::from).collect(),
            total: page.total,
        })
    }

    pub async fn stats(&self, owner_id: Option<&str>) -> StoreResult<StorageStats> {
        Ok(self.catalog.aggregate_size_by_owner(owner_id)?)
    }

    /// Delete blobs no pointer refers to.
    ///
    /// Runs without locks. A blob written by an in-flight `store` whose
    /// pointer is not yet in the catalog may be swept; that store then fails
    /// on read and the caller retries. `backups` is never swept.
    pub async fn cleanup_orphans(&self) -> StoreResult<CleanupReport> {
        let known = self.catalog.known_paths()?;
        let mut report = CleanupReport::default();

        for category in StorageCategory::ALL {
            if category == StorageCategory::Backups {
                continue;
            }
            let entries = match self
                .op
                .list_with(&category_prefix(category))
                .recursive(true)
                .await
            {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                let path = entry.path();
                if path.ends_with('/') {
                    continue;
                }
                report.scanned += 1;
                if known.contains(path) {
                    continue;
                }
                match self.op.delete(path).await {
                    Ok(()) => {
                        info!(path = %path, "removed orphaned blob");
                        report.removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path, "failed to remove orphaned blob: {e}");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "orphan sweep complete"
        );
        Ok(report)
    }

    pub(crate) fn lookup(&self, file_id: &str, owner_id: &str) -> StoreResult<StoredFilePointer> {
        self.catalog
            .find_by_id_and_owner(file_id, owner_id)?
            .ok_or(StoreError::NotFoundOrDenied)
    }

    pub(crate) async fn lock_file(&self, file_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.locks.lock(file_id).await
    }
}
