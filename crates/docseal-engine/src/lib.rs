//! docseal-engine: encrypted document store
//!
//! `FileStore` owns the public contract (store / retrieve / delete / list /
//! stats / orphan cleanup); `BackupArchiver` adds password-protected bulk
//! export and restore on top of it. Pointer rows live behind the
//! `PointerCatalog` trait; upload rules come from `ValidationPolicy`.

pub mod backup;
pub mod catalog;
pub mod error;
pub mod locks;
pub mod store;
pub mod validation;

pub use backup::{BackupArchiver, BackupReport, RestoreReport};
pub use catalog::{JsonCatalog, MemoryCatalog, PointerCatalog};
pub use error::{StoreError, StoreResult, StoreStage, ValidationError};
pub use store::{kdf_params, CleanupReport, FileStore, RetrievedFile};
pub use validation::ValidationPolicy;
