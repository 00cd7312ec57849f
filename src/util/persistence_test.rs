use super::*;

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("authgate-{name}-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

// =============================================================
// MemoryStore
// =============================================================

#[test]
fn memory_store_set_get_remove() {
    let store = MemoryStore::new();
    assert!(store.is_empty());
    store.set("authenticated", "true");
    assert_eq!(store.get("authenticated").as_deref(), Some("true"));
    store.remove("authenticated");
    assert_eq!(store.get("authenticated"), None);
}

#[test]
fn memory_store_clear_drops_everything() {
    let store = MemoryStore::new();
    store.set("a", "1");
    store.set("b", "2");
    assert_eq!(store.len(), 2);
    store.clear();
    assert!(store.is_empty());
}

// =============================================================
// FileStore
// =============================================================

#[test]
fn file_store_missing_file_is_empty() {
    let path = temp_path("missing");
    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get("authenticated"), None);
    assert_eq!(store.path(), path.as_path());
}

#[test]
fn file_store_persists_across_reopen() {
    let path = temp_path("reopen");
    {
        let store = FileStore::open(&path).unwrap();
        store.set("authenticated", "true");
    }
    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get("authenticated").as_deref(), Some("true"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn file_store_clear_is_flushed() {
    let path = temp_path("clear");
    let store = FileStore::open(&path).unwrap();
    store.set("authenticated", "true");
    store.clear();
    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get("authenticated"), None);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn file_store_rejects_non_object_json() {
    let path = temp_path("garbage");
    std::fs::write(&path, "[1, 2, 3]").unwrap();
    let err = FileStore::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Json { .. }));
    let _ = std::fs::remove_file(&path);
}

// =============================================================
// BrowserStorage (non-hydrate)
// =============================================================

#[cfg(not(feature = "hydrate"))]
#[test]
fn browser_storage_is_inert_outside_browser() {
    let store = BrowserStorage::new(BrowserArea::Local);
    store.set("authenticated", "true");
    assert_eq!(store.get("authenticated"), None);
    store.remove("authenticated");
    store.clear();
    assert_eq!(store.area(), BrowserArea::Local);
}
