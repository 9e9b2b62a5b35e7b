//! Backend check behind `docseal health`.
//!
//! Both supported backends (an `fs` root directory or the in-process
//! `memory` store) must list their root and accept writes. Category
//! partitions appear on first store, so a missing one is reported rather
//! than treated as a failure.

use anyhow::{bail, Context, Result};
use docseal_core::config::StorageConfig;
use docseal_core::StorageCategory;
use opendal::Operator;

use crate::layout::category_prefix;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// `storage.backend` as configured
    pub backend: String,
    /// Partitions that already exist under the root
    pub partitions: Vec<StorageCategory>,
}

impl HealthReport {
    pub fn has_partition(&self, category: StorageCategory) -> bool {
        self.partitions.contains(&category)
    }
}

/// Check that the operator built from `cfg` can hold docseal blobs.
pub async fn check_health(op: &Operator, cfg: &StorageConfig) -> Result<HealthReport> {
    let backend = cfg.backend.as_str();
    let cap = op.info().full_capability();
    if !cap.write || !cap.list {
        bail!(
            "{backend} backend cannot hold blobs (write: {}, list: {})",
            cap.write,
            cap.list
        );
    }

    let entries = op.list("/").await.with_context(|| match backend {
        "fs" => format!("fs backend unreachable at {}", cfg.root.display()),
        other => format!("{other} backend unreachable"),
    })?;

    let partitions = StorageCategory::ALL
        .into_iter()
        .filter(|category| {
            let prefix = category_prefix(*category);
            entries.iter().any(|e| e.path() == prefix)
        })
        .collect();

    Ok(HealthReport {
        backend: backend.to_string(),
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_memory_backend_is_healthy() {
        let cfg = StorageConfig {
            backend: "memory".into(),
            ..Default::default()
        };
        let op = crate::operator::build_operator(&cfg).unwrap();
        let report = check_health(&op, &cfg).await.unwrap();
        assert_eq!(report.backend, "memory");
        assert!(report.partitions.is_empty());
    }

    #[tokio::test]
    async fn test_fs_backend_reports_created_partitions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = StorageConfig {
            backend: "fs".into(),
            root: tmp.path().to_path_buf(),
        };
        let op = crate::operator::build_operator(&cfg).unwrap();

        let report = check_health(&op, &cfg).await.unwrap();
        assert!(report.partitions.is_empty());

        std::fs::create_dir_all(tmp.path().join("images")).unwrap();
        let report = check_health(&op, &cfg).await.unwrap();
        assert_eq!(report.backend, "fs");
        assert!(report.has_partition(StorageCategory::Images));
        assert!(!report.has_partition(StorageCategory::Documents));
    }
}
