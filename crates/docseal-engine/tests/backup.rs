mod common;

use common::{memory_store, new_file, secret};
use docseal_engine::StoreError;
use std::collections::BTreeMap;

/// (original name → (content, metadata)) for every file of `owner`.
async fn snapshot(
    store: &docseal_engine::FileStore<docseal_engine::MemoryCatalog>,
    owner: &str,
    mk: &secrecy::SecretString,
) -> BTreeMap<String, (Vec<u8>, docseal_core::FileMetadata)> {
    let mut out = BTreeMap::new();
    let page = store
        .list(
            owner,
            &docseal_core::ListOptions {
                limit: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for record in page.files {
        let file = store.retrieve(&record.id, owner, mk).await.unwrap();
        out.insert(record.id, (file.content.to_vec(), file.metadata));
    }
    out
}

#[tokio::test]
async fn test_backup_restore_into_empty_store() {
    let source = memory_store();
    let mk = secret("mk");
    for i in 0..7u8 {
        let mime = if i % 3 == 0 { "image/png" } else { "text/plain" };
        source
            .store(vec![i; 5 + i as usize], new_file(&format!("f{i}"), mime), "u1", &mk)
            .await
            .unwrap();
    }
    source
        .store(b"not mine".to_vec(), new_file("x.txt", "text/plain"), "u2", &mk)
        .await
        .unwrap();

    let report = source
        .archiver()
        .create_backup("u1", &mk, &secret("backup-pw"))
        .await
        .unwrap();
    assert_eq!(report.included, 7);
    assert_eq!(report.failed, 0);
    assert!(report.path.starts_with("backups/"));

    // Move the backup blob into a fresh store sharing nothing else.
    let target = memory_store();
    let blob = source.operator().read(&report.path).await.unwrap().to_vec();
    target.operator().write(&report.path, blob).await.unwrap();

    let restored = target
        .archiver()
        .restore_backup(&report.path, "u1", &mk, &secret("backup-pw"))
        .await
        .unwrap();
    assert_eq!(restored.restored, 7);
    assert_eq!(restored.failed, 0);

    let before = snapshot(&source, "u1", &mk).await;
    let after = snapshot(&target, "u1", &mk).await;
    assert_eq!(before, after);
    assert_eq!(target.stats(Some("u2")).await.unwrap().total_files, 0);
}

#[tokio::test]
async fn test_restore_under_new_master_key() {
    let store = memory_store();
    let record = store
        .store(b"portable".to_vec(), new_file("p.txt", "text/plain"), "u1", &secret("old"))
        .await
        .unwrap();
    let report = store
        .archiver()
        .create_backup("u1", &secret("old"), &secret("pw"))
        .await
        .unwrap();
    store.delete(&record.id, "u1").await.unwrap();

    let restored = store
        .archiver()
        .restore_backup(&report.path, "u1", &secret("new"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(restored.restored, 1);

    let file = store.retrieve(&record.id, "u1", &secret("new")).await.unwrap();
    assert_eq!(file.content.as_slice(), b"portable");
}

#[tokio::test]
async fn test_restore_wrong_password() {
    let store = memory_store();
    store
        .store(b"data".to_vec(), new_file("d.txt", "text/plain"), "u1", &secret("mk"))
        .await
        .unwrap();
    let report = store
        .archiver()
        .create_backup("u1", &secret("mk"), &secret("right"))
        .await
        .unwrap();

    let err = store
        .archiver()
        .restore_backup(&report.path, "u1", &secret("mk"), &secret("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Decryption), "got {err:?}");
}

#[tokio::test]
async fn test_restore_skips_existing_and_rejects_other_owner() {
    let store = memory_store();
    store
        .store(b"keep".to_vec(), new_file("k.txt", "text/plain"), "u1", &secret("mk"))
        .await
        .unwrap();
    let report = store
        .archiver()
        .create_backup("u1", &secret("mk"), &secret("pw"))
        .await
        .unwrap();

    let again = store
        .archiver()
        .restore_backup(&report.path, "u1", &secret("mk"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(again.restored, 0);
    assert_eq!(again.skipped, 1);

    let err = store
        .archiver()
        .restore_backup(&report.path, "u2", &secret("mk"), &secret("pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFoundOrDenied));
}

#[tokio::test]
async fn test_backup_tolerates_unreadable_files() {
    let store = memory_store();
    let good = store
        .store(b"good".to_vec(), new_file("g.txt", "text/plain"), "u1", &secret("mk"))
        .await
        .unwrap();
    let bad = store
        .store(b"bad".to_vec(), new_file("b.txt", "text/plain"), "u1", &secret("mk"))
        .await
        .unwrap();
    store.operator().delete(&bad.path).await.unwrap();

    let report = store
        .archiver()
        .create_backup("u1", &secret("mk"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(report.included, 1);
    assert_eq!(report.failed, 1);

    let backups = store.archiver().list_backups("u1").await.unwrap();
    assert_eq!(backups, vec![report.path.clone()]);
    assert!(store.archiver().list_backups("u2").await.unwrap().is_empty());

    store.delete(&good.id, "u1").await.unwrap();
    let restored = store
        .archiver()
        .restore_backup(&report.path, "u1", &secret("mk"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(restored.restored, 1);
}

#[tokio::test]
async fn test_empty_backup() {
    let store = memory_store();
    let report = store
        .archiver()
        .create_backup("nobody", &secret("mk"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(report.included, 0);

    let restored = store
        .archiver()
        .restore_backup(&report.path, "nobody", &secret("mk"), &secret("pw"))
        .await
        .unwrap();
    assert_eq!(restored, docseal_engine::RestoreReport::default());
}

#[tokio::test]
async fn test_backup_leaves_access_stats_alone() {
    let store = memory_store();
    let mk = secret("mk");
    for name in ["a.txt", "b.txt"] {
        store
            .store(b"quiet".to_vec(), new_file(name, "text/plain"), "u1", &mk)
            .await
            .unwrap();
    }

    let report = store
        .archiver()
        .create_backup("u1", &mk, &secret("pw"))
        .await
        .unwrap();
    assert_eq!(report.included, 2);

    let page = store
        .list("u1", &docseal_core::ListOptions::default())
        .await
        .unwrap();
    assert_eq!(page.files.len(), 2);
    for record in &page.files {
        assert_eq!(record.access_count, 0, "{}", record.id);
        assert!(record.last_accessed_at.is_none());
    }
}
