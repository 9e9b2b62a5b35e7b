//! Pointer catalog: the persistence collaborator behind `FileStore`.
//!
//! Two backends are available:
//!   - **Memory**: process-local, for tests and embedding.
//!   - **JSON**: whole catalog in memory, flushed atomically via temp+rename
//!     after every mutation.
//!
//! Both implement `PointerCatalog`. Every lookup the engine does is scoped by
//! owner; the engine never reads a pointer without one.

use docseal_core::{
    unix_now, DocsealError, DocsealResult, ListOptions, ListPage, StorageStats,
    StoredFilePointer,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait PointerCatalog: Send + Sync {
    /// Insert a new pointer. Fails if the id is already taken.
    fn create(&self, pointer: StoredFilePointer) -> DocsealResult<()>;
    /// Pointer for `id` if and only if it belongs to `owner_id`.
    fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> DocsealResult<Option<StoredFilePointer>>;
    /// Bump `accessCount` and set `lastAccessedAt` to now.
    fn update_access_stats(&self, id: &str) -> DocsealResult<()>;
    /// Remove a pointer. Returns false if it was already gone.
    fn delete_by_id(&self, id: &str) -> DocsealResult<bool>;
    /// One page of an owner's pointers, newest first.
    fn list_by_owner(
        &self,
        owner_id: &str,
        opts: &ListOptions,
    ) -> DocsealResult<ListPage<StoredFilePointer>>;
    /// Totals for one owner, or for the whole catalog when `owner_id` is None.
    fn aggregate_size_by_owner(&self, owner_id: Option<&str>) -> DocsealResult<StorageStats>;
    /// Every blob path referenced by a live pointer.
    fn known_paths(&self) -> DocsealResult<HashSet<String>>;
}

/// Pointer rows keyed by id. Shared by both backends.
#[derive(Debug, Default)]
struct PointerTable {
    rows: HashMap<String, StoredFilePointer>,
}

impl PointerTable {
    fn create(&mut self, pointer: StoredFilePointer) -> DocsealResult<()> {
        if self.rows.contains_key(&pointer.id) {
            return Err(DocsealError::Catalog(format!(
                "pointer already exists: {}",
                pointer.id
            )));
        }
        self.rows.insert(pointer.id.clone(), pointer);
        Ok(())
    }

    fn find(&self, id: &str, owner_id: &str) -> Option<StoredFilePointer> {
        self.rows
            .get(id)
            .filter(|p| p.user_id == owner_id)
            .cloned()
    }

    fn touch(&mut self, id: &str) -> bool {
        match self.rows.get_mut(id) {
            Some(p) => {
                p.access_count += 1;
                p.last_accessed_at = Some(unix_now());
                true
            }
            None => false,
        }
    }

    fn delete(&mut self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }

    fn list(&self, owner_id: &str, opts: &ListOptions) -> ListPage<StoredFilePointer> {
        let (page, limit) = opts.normalized();
        let mut matching: Vec<&StoredFilePointer> = self
            .rows
            .values()
            .filter(|p| p.user_id == owner_id)
            .filter(|p| opts.category.map_or(true, |c| p.category == c))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len();
        let files = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();
        ListPage { files, total }
    }

    fn aggregate(&self, owner_id: Option<&str>) -> StorageStats {
        let mut stats = StorageStats::default();
        for p in self
            .rows
            .values()
            .filter(|p| owner_id.map_or(true, |o| p.user_id == o))
        {
            stats.record(p.category, p.size);
        }
        stats
    }

    fn paths(&self) -> HashSet<String> {
        self.rows.values().map(|p| p.path.clone()).collect()
    }
}

fn lock(table: &Mutex<PointerTable>) -> MutexGuard<'_, PointerTable> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Process-local catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    table: Mutex<PointerTable>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.table).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointerCatalog for MemoryCatalog {
    fn create(&self, pointer: StoredFilePointer) -> DocsealResult<()> {
        lock(&self.table).create(pointer)
    }

    fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> DocsealResult<Option<StoredFilePointer>> {
        Ok(lock(&self.table).find(id, owner_id))
    }

    fn update_access_stats(&self, id: &str) -> DocsealResult<()> {
        lock(&self.table).touch(id);
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> DocsealResult<bool> {
        Ok(lock(&self.table).delete(id))
    }

    fn list_by_owner(
        &self,
        owner_id: &str,
        opts: &ListOptions,
    ) -> DocsealResult<ListPage<StoredFilePointer>> {
        Ok(lock(&self.table).list(owner_id, opts))
    }

    fn aggregate_size_by_owner(&self, owner_id: Option<&str>) -> DocsealResult<StorageStats> {
        Ok(lock(&self.table).aggregate(owner_id))
    }

    fn known_paths(&self) -> DocsealResult<HashSet<String>> {
        Ok(lock(&self.table).paths())
    }
}

/// Catalog persisted to a single JSON file.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    table: Mutex<PointerTable>,
}

impl JsonCatalog {
    /// Load or create a catalog at the given path.
    /// If the file doesn't exist, starts empty; nothing is written until the
    /// first mutation.
    pub fn open(path: &Path) -> DocsealResult<Self> {
        let rows: HashMap<String, StoredFilePointer> = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                DocsealError::Catalog(format!("parsing catalog {}: {e}", path.display()))
            })?
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), pointers = rows.len(), "opened catalog");

        Ok(Self {
            path: path.to_path_buf(),
            table: Mutex::new(PointerTable { rows }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write: temp file, then rename over the catalog.
    fn flush(&self, table: &PointerTable) -> DocsealResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&table.rows)
            .map_err(|e| DocsealError::Catalog(format!("serializing catalog: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PointerCatalog for JsonCatalog {
    fn create(&self, pointer: StoredFilePointer) -> DocsealResult<()> {
        let mut table = lock(&self.table);
        let id = pointer.id.clone();
        table.create(pointer)?;
        if let Err(e) = self.flush(&table) {
            table.delete(&id);
            return Err(e);
        }
        Ok(())
    }

    fn find_by_id_and_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> DocsealResult<Option<StoredFilePointer>> {
        Ok(lock(&self.table).find(id, owner_id))
    }

    fn update_access_stats(&self, id: &str) -> DocsealResult<()> {
        let mut table = lock(&self.table);
        if table.touch(id) {
            self.flush(&table)?;
        }
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> DocsealResult<bool> {
        let mut table = lock(&self.table);
        let Some(removed) = table.rows.remove(id) else {
            return Ok(false);
        };
        if let Err(e) = self.flush(&table) {
            table.rows.insert(removed.id.clone(), removed);
            return Err(e);
        }
        Ok(true)
    }

    fn list_by_owner(
        &self,
        owner_id: &str,
        opts: &ListOptions,
    ) -> DocsealResult<ListPage<StoredFilePointer>> {
        Ok(lock(&self.table).list(owner_id, opts))
    }

    fn aggregate_size_by_owner(&self, owner_id: Option<&str>) -> DocsealResult<StorageStats> {
        Ok(lock(&self.table).aggregate(owner_id))
    }

    fn known_paths(&self) -> DocsealResult<HashSet<String>> {
        Ok(lock(&self.table).paths())
    }
}
