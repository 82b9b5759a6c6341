//! Session store round-trips over a temp directory.

use tempfile::TempDir;
use watchscrape::session::{SessionCookie, SessionStore, StorageState};

fn sample_state() -> StorageState {
    StorageState {
        cookies: vec![SessionCookie {
            name: "session-id".to_string(),
            value: "abc123".to_string(),
            domain: Some(".imdb.com".to_string()),
            path: Some("/".to_string()),
            expires: Some(1_900_000_000.0),
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }],
        origins: vec![],
    }
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(dir.path()).expect("store");

    assert!(store.load("default").await.is_none());

    store.save("default", sample_state()).await;
    let loaded = store.load("default").await.expect("state present");
    assert_eq!(loaded.cookies.len(), 1);
    assert_eq!(loaded.cookies[0].name, "session-id");
    assert!(loaded.cookies[0].http_only);
}

#[tokio::test]
async fn load_survives_a_fresh_store_instance() {
    let dir = TempDir::new().expect("temp dir");

    {
        let store = SessionStore::new(dir.path()).expect("store");
        store.save("default", sample_state()).await;
    }

    // New instance, cold memo: must come off disk
    let store = SessionStore::new(dir.path()).expect("store");
    let loaded = store.load("default").await.expect("state present");
    assert_eq!(loaded.cookies[0].value, "abc123");
}

#[tokio::test]
async fn identities_are_sanitized_for_the_filesystem() {
    let dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(dir.path()).expect("store");

    store.save("proxy/eu-west:3128", sample_state()).await;
    let loaded = store.load("proxy/eu-west:3128").await;
    assert!(loaded.is_some());

    // Nothing escaped the session directory
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("readable dir")
        .filter_map(Result::ok)
        .collect();
    assert!(!entries.is_empty());
    for entry in entries {
        assert!(entry.path().is_file());
    }
}

#[tokio::test]
async fn clear_removes_state() {
    let dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(dir.path()).expect("store");

    store.save("default", sample_state()).await;
    store.clear("default").await;
    assert!(store.load("default").await.is_none());
}

#[tokio::test]
async fn corrupt_blobs_are_discarded() {
    let dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(dir.path()).expect("store");

    std::fs::write(dir.path().join("default.json"), b"{not json").expect("write");
    assert!(store.load("default").await.is_none());
}
