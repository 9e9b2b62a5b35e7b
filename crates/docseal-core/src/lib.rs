//! docseal-core: shared data model, config schema, and error types

pub mod config;
pub mod error;
pub mod types;

pub use error::{DocsealError, DocsealResult};
pub use types::{
    unix_now, CategoryStats, FileMetadata, FileRecord, ListOptions, ListPage, NewFile,
    StorageCategory, StorageStats, StoredFilePointer,
};
