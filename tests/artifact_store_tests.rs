// Integration tests for the local artifact store

use anyhow::Result;
use duet_studio::{ArtifactStore, LocalArtifactStore};
use std::time::Duration;
use tempfile::TempDir;

fn store(root: &TempDir) -> LocalArtifactStore {
    LocalArtifactStore::new(
        root.path().join("store"),
        "http://localhost:4000/artifacts",
        "test-secret",
    )
}

#[tokio::test]
async fn upload_stores_the_file_under_its_key() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store(&temp_dir);

    let source = temp_dir.path().join("final.mp4");
    std::fs::write(&source, b"fake video bytes")?;

    let url = store
        .upload(&source, "recordings/room-1/final-1.mp4", "video/mp4")
        .await?;
    assert_eq!(
        url,
        "http://localhost:4000/artifacts/recordings/room-1/final-1.mp4"
    );

    let stored = temp_dir
        .path()
        .join("store")
        .join("recordings/room-1/final-1.mp4");
    assert_eq!(std::fs::read(&stored)?, b"fake video bytes");

    // The public URL maps back to the storage key.
    assert_eq!(
        store.key_of(&url).as_deref(),
        Some("recordings/room-1/final-1.mp4")
    );

    Ok(())
}

#[tokio::test]
async fn signed_urls_verify_until_expiry() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store(&temp_dir);

    let key = "recordings/room-1/final-1.mp4";
    let url = store.signed_url(key, Duration::from_secs(600)).await?;
    assert!(url.starts_with("http://localhost:4000/artifacts/recordings/"));

    let query = url.split_once('?').map(|(_, q)| q).unwrap();
    let mut expires = None;
    let mut sig = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("expires", v)) => expires = v.parse::<i64>().ok(),
            Some(("sig", v)) => sig = Some(v.to_string()),
            _ => {}
        }
    }
    let expires = expires.expect("expires param");
    let sig = sig.expect("sig param");

    assert!(store.verify(key, expires, &sig));
    // Tokens are bound to the key and the expiry.
    assert!(!store.verify("recordings/room-1/other.mp4", expires, &sig));
    assert!(!store.verify(key, expires + 1, &sig));
    // A timestamp in the past fails regardless of the token.
    let past = chrono::Utc::now().timestamp() - 10;
    assert!(!store.verify(key, past, &sig));

    Ok(())
}

#[tokio::test]
async fn different_secrets_produce_incompatible_tokens() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let a = LocalArtifactStore::new(temp_dir.path().into(), "http://host/a", "secret-a");
    let b = LocalArtifactStore::new(temp_dir.path().into(), "http://host/a", "secret-b");

    let url = a.signed_url("k.mp4", Duration::from_secs(60)).await?;
    let query = url.split_once('?').map(|(_, q)| q).unwrap();
    let mut expires = 0;
    let mut sig = String::new();
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("expires", v)) => expires = v.parse().unwrap(),
            Some(("sig", v)) => sig = v.to_string(),
            _ => {}
        }
    }

    assert!(a.verify("k.mp4", expires, &sig));
    assert!(!b.verify("k.mp4", expires, &sig));

    Ok(())
}
