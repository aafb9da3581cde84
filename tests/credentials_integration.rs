//! Integration tests for the credential store and its encrypted persistence.

use openrosa_core::{CredentialStore, StorageError};
use tempfile::TempDir;

#[test]
fn test_set_get_clear_contract() {
    let store = CredentialStore::new();
    store.set("https://srv.example", "alice", "s3cret");

    let creds = store.get("https://srv.example");
    assert_eq!(creds.username, "alice");
    assert_eq!(creds.password(), "s3cret");

    assert!(!store.get("https://unseen.example").has_credentials());

    store.clear("https://srv.example");
    let cleared = store.get("https://srv.example");
    assert_eq!(cleared.username, "");
    assert_eq!(cleared.password(), "");
}

#[test]
fn test_persisted_store_round_trips_and_rejects_wrong_key() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("openrosa").join("credentials.enc");

    let store = CredentialStore::new();
    store.set("https://srv.example", "alice", "s3cret");
    store.set("https://srv.example/project/7", "bob", "hunter2");
    store.save_to(&path, "master-key").expect("save");

    let raw = std::fs::read(&path).expect("read payload");
    assert!(!raw.windows(6).any(|window| window == b"s3cret"));

    let loaded = CredentialStore::load_from(&path, "master-key").expect("load");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("https://srv.example/formList").username, "alice");
    assert_eq!(
        loaded.get("https://srv.example/project/7/formList").password(),
        "hunter2"
    );

    let err = CredentialStore::load_from(&path, "other-key").expect_err("wrong key");
    assert!(matches!(err, StorageError::DecryptionFailed));
    assert!(!err.to_string().contains("master-key"));
}

#[test]
fn test_loading_garbage_reports_invalid_payload() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("credentials.enc");
    std::fs::write(&path, b"garbage").expect("write");

    let err = CredentialStore::load_from(&path, "master-key").expect_err("garbage payload");
    assert!(matches!(err, StorageError::InvalidPayload));
}
