//! OpenDAL Operator factory for docseal storage backends

use anyhow::{Context, Result};
use docseal_core::config::StorageConfig;
use opendal::{Builder, Operator};

/// Build the blob operator described by the storage config.
///
/// `fs` roots the operator at `storage.root`, so every resolved path lands
/// under that fixed directory. `memory` keeps blobs in-process.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    match cfg.backend.as_str() {
        "fs" => {
            let root = if cfg.root.is_absolute() {
                cfg.root.clone()
            } else {
                std::env::current_dir()
                    .context("resolving relative storage root")?
                    .join(&cfg.root)
            };
            let root = root
                .to_str()
                .with_context(|| format!("storage root is not UTF-8: {}", root.display()))?
                .to_string();
            tracing::debug!(root = %root, "building fs operator");
            finish(opendal::services::Fs::default().root(&root))
        }
        "memory" => memory_operator(),
        other => anyhow::bail!("unknown storage backend: {other} (expected \"fs\" or \"memory\")"),
    }
}

/// In-process operator, used by tests and the `memory` backend.
pub fn memory_operator() -> Result<Operator> {
    finish(opendal::services::Memory::default())
}

fn finish<B: Builder>(builder: B) -> Result<Operator> {
    let op = Operator::new(builder)
        .context("creating OpenDAL operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        )
        .finish();
    Ok(op)
}
