//! Tests for reopening a storage from its bucket files
//!
//! These tests verify:
//! - A fresh context rebuilds exactly the committed key set
//! - Corrupt and torn slots are skipped but stay occupied
//! - Relocating a slot nobody references leaves the index intact
//! - Stray files in the storage directory are ignored

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotkv::storage::PersistedStorage;
use slotkv::{Config, Storage, StoreContext};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const NAME: &str = "recovery";

/// Slot size for the short "kN" -> "vN" records used below
const SLOT: u64 = 32;

async fn open(data_dir: &Path) -> Arc<PersistedStorage<String>> {
    let config = Config::builder().data_dir(data_dir).build();
    StoreContext::new(config).open::<String>(NAME).await.unwrap()
}

fn bucket_file(data_dir: &Path) -> PathBuf {
    data_dir.join(NAME).join(SLOT.to_string())
}

fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

fn s(value: &str) -> String {
    value.to_string()
}

// =============================================================================
// Restart Tests
// =============================================================================

#[tokio::test]
async fn test_reopen_rebuilds_key_set() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(temp.path()).await;
        for i in 0..20 {
            store.put(&format!("k{:02}", i), &format!("v{}", i)).await.unwrap();
        }
        store.put("big", &"x".repeat(1000)).await.unwrap();
        for i in (0..20).step_by(3) {
            store.delete(&format!("k{:02}", i)).await.unwrap();
        }
        store.put("k01", &s("rewritten")).await.unwrap();
    }

    let store = open(temp.path()).await;
    let report = store.scan_report();
    assert_eq!(report.records, 14);
    assert_eq!(report.corrupt, 0);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.buckets, 2);

    assert_eq!(store.get("k00").await.unwrap(), None);
    assert_eq!(store.get("k01").await.unwrap(), Some(s("rewritten")));
    assert_eq!(store.get("k02").await.unwrap(), Some(s("v2")));
    assert_eq!(store.get("big").await.unwrap(), Some("x".repeat(1000)));
    assert_eq!(store.range(Some("k"), Some("l"), None).await.unwrap().len(), 13);
}

#[tokio::test]
async fn test_reopen_empty_storage() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(temp.path()).await;
        store.put("k1", &s("v1")).await.unwrap();
        store.delete("k1").await.unwrap();
    }

    let store = open(temp.path()).await;
    assert!(store.is_empty().await);
    assert_eq!(store.scan_report().buckets, 1);
    assert_eq!(file_len(&bucket_file(temp.path())), 0);
}

// =============================================================================
// Corrupt Slot Tests
// =============================================================================

#[tokio::test]
async fn test_corrupt_slot_is_skipped_but_occupied() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
    }
    append_bytes(&path, &[0xFF; SLOT as usize]);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().records, 1);
    assert_eq!(store.scan_report().corrupt, 1);
    assert_eq!(store.get("k1").await.unwrap(), Some(s("v1")));

    // The next record lands after the corrupt slot
    store.add("k2", &s("v2")).await.unwrap();
    assert_eq!(file_len(&path), 3 * SLOT);
    assert_eq!(store.buckets().await[0].count, 3);
    assert_eq!(store.range(None, None, None).await.unwrap(), ["v1", "v2"]);
}

#[tokio::test]
async fn test_undecodable_payload_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
    }
    // Valid header, payload that is not a record
    let mut slot = vec![0u8; SLOT as usize];
    slot[0] = 4;
    slot[2..6].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    append_bytes(&path, &slot);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().records, 1);
    assert_eq!(store.scan_report().corrupt, 1);
}

#[tokio::test]
async fn test_torn_trailing_slot_is_occupied() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
    }
    append_bytes(&path, &[0u8; 10]);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().corrupt, 1);
    assert_eq!(store.buckets().await[0].count, 2);

    store.add("k2", &s("v2")).await.unwrap();
    assert_eq!(file_len(&path), 3 * SLOT);
    assert_eq!(store.get("k2").await.unwrap(), Some(s("v2")));
}

#[tokio::test]
async fn test_duplicate_slot_keeps_first() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("first")).await.unwrap();
        store.add("k2", &s("other")).await.unwrap();
    }
    // Copy slot 0 to the end of the file
    let raw = std::fs::read(&path).unwrap();
    append_bytes(&path, &raw[..SLOT as usize]);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().records, 2);
    assert_eq!(store.scan_report().duplicates, 1);
    assert_eq!(store.buckets().await[0].count, 3);
    assert_eq!(store.get("k1").await.unwrap(), Some(s("first")));
}

#[tokio::test]
async fn test_delete_releases_duplicate_copies() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
    }
    let raw = std::fs::read(&path).unwrap();
    append_bytes(&path, &raw[..SLOT as usize]);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().duplicates, 1);

    assert!(store.delete("k1").await.unwrap());
    assert_eq!(store.get("k1").await.unwrap(), None);
    assert_eq!(file_len(&path), 0);
    drop(store);

    let store = open(temp.path()).await;
    assert_eq!(store.get("k1").await.unwrap(), None);
    assert_eq!(store.scan_report().duplicates, 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_delete_releases_duplicate_before_relocating() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
        store.add("k2", &s("v2")).await.unwrap();
    }
    // Disk: k1, k2, k1
    let raw = std::fs::read(&path).unwrap();
    append_bytes(&path, &raw[..SLOT as usize]);

    let store = open(temp.path()).await;
    assert!(store.delete("k1").await.unwrap());
    assert_eq!(store.get("k2").await.unwrap(), Some(s("v2")));
    assert_eq!(store.buckets().await[0].count, 1);
    assert_eq!(file_len(&path), SLOT);
    drop(store);

    let store = open(temp.path()).await;
    assert_eq!(store.get("k1").await.unwrap(), None);
    assert_eq!(store.range(None, None, None).await.unwrap(), ["v2"]);
    assert_eq!(store.scan_report().duplicates, 0);
}

// =============================================================================
// Relocation Tests
// =============================================================================

#[tokio::test]
async fn test_orphan_slot_relocation_keeps_index_consistent() {
    let temp = TempDir::new().unwrap();
    let path = bucket_file(temp.path());
    {
        let store = open(temp.path()).await;
        store.add("k1", &s("v1")).await.unwrap();
        store.add("k2", &s("v2")).await.unwrap();
    }
    append_bytes(&path, &[0xFF; SLOT as usize]);

    // Disk: k1, k2, garbage, k3
    let store = open(temp.path()).await;
    store.add("k3", &s("v3")).await.unwrap();
    assert_eq!(file_len(&path), 4 * SLOT);

    // k3 moves into slot 0
    assert!(store.delete("k1").await.unwrap());
    assert_eq!(store.get("k3").await.unwrap(), Some(s("v3")));
    assert_eq!(file_len(&path), 3 * SLOT);

    // The garbage slot moves into slot 1; no key follows it
    assert!(store.delete("k2").await.unwrap());
    assert_eq!(store.get("k3").await.unwrap(), Some(s("v3")));
    assert_eq!(store.get("k2").await.unwrap(), None);
    assert_eq!(store.len().await, 1);
    assert_eq!(file_len(&path), 2 * SLOT);

    // The garbage slot moves into slot 0
    assert!(store.delete("k3").await.unwrap());
    assert!(store.is_empty().await);
    assert_eq!(file_len(&path), SLOT);

    store.add("k4", &s("v4")).await.unwrap();
    assert_eq!(store.get("k4").await.unwrap(), Some(s("v4")));
    drop(store);

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().records, 1);
    assert_eq!(store.scan_report().corrupt, 1);
    assert_eq!(store.range(None, None, None).await.unwrap(), ["v4"]);
}

// =============================================================================
// Directory Scan Tests
// =============================================================================

#[tokio::test]
async fn test_non_bucket_files_are_ignored() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(NAME);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("notanumber"), b"junk").unwrap();
    std::fs::write(dir.join("100"), b"junk").unwrap();
    std::fs::write(dir.join("2"), b"junk").unwrap();
    std::fs::write(dir.join("64.bak"), b"junk").unwrap();

    let store = open(temp.path()).await;
    assert_eq!(store.scan_report().buckets, 0);
    assert!(store.is_empty().await);

    store.add("k1", &s("v1")).await.unwrap();
    assert_eq!(std::fs::read(dir.join("100")).unwrap(), b"junk");
    assert_eq!(store.buckets().await.len(), 1);
}

#[tokio::test]
async fn test_unopenable_bucket_is_reported() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(NAME);
    std::fs::create_dir_all(dir.join("64")).unwrap();
    {
        let store = open(temp.path()).await;
        assert_eq!(store.scan_report().failed_files, 1);
        store.add("k1", &s("v1")).await.unwrap();
    }

    let store = open(temp.path()).await;
    assert_eq!(store.get("k1").await.unwrap(), Some(s("v1")));
}
