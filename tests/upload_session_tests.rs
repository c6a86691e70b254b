// Integration tests for chunked upload sessions
//
// These tests verify that out-of-order and duplicate chunk deliveries
// reassemble into the same bytes as an in-order upload, and that the
// session lifecycle (missing chunks, finalize-once, expiry) holds.

use anyhow::Result;
use duet_studio::upload::{canonical_capture_path, ChunkUploadManager};
use duet_studio::StudioError;
use tempfile::TempDir;

#[tokio::test]
async fn out_of_order_and_duplicate_chunks_reassemble_identically() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    let chunks: Vec<Vec<u8>> = (0u8..4).map(|i| vec![i; 64]).collect();
    let total_size: u64 = chunks.iter().map(|c| c.len() as u64).sum();

    // Scrambled delivery, including a duplicate of chunk 1 with stale bytes
    // first; the later write must win.
    let scrambled = manager
        .init_session("room-a", "user-1", total_size, 4)
        .await?;
    manager.put_chunk(&scrambled, 3, &chunks[3]).await?;
    manager.put_chunk(&scrambled, 1, b"stale bytes").await?;
    manager.put_chunk(&scrambled, 0, &chunks[0]).await?;
    manager.put_chunk(&scrambled, 1, &chunks[1]).await?;
    let ack = manager.put_chunk(&scrambled, 2, &chunks[2]).await?;
    assert_eq!(ack.received, 4, "duplicate index must not inflate the count");

    let out_scrambled = manager.finalize(&scrambled).await?;

    // In-order delivery for a second user.
    let ordered = manager
        .init_session("room-a", "user-2", total_size, 4)
        .await?;
    for (i, chunk) in chunks.iter().enumerate() {
        manager.put_chunk(&ordered, i as u32, chunk).await?;
    }
    let out_ordered = manager.finalize(&ordered).await?;

    let bytes_scrambled = std::fs::read(&out_scrambled.path)?;
    let bytes_ordered = std::fs::read(&out_ordered.path)?;
    assert_eq!(bytes_scrambled, bytes_ordered);
    assert_eq!(out_scrambled.size, total_size);

    Ok(())
}

#[tokio::test]
async fn concurrent_chunk_writes_assemble_in_index_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = std::sync::Arc::new(ChunkUploadManager::new(temp_dir.path().to_path_buf()));

    let total_chunks = 16u32;
    let session_id = manager
        .init_session("room-b", "user-1", 16 * 32, total_chunks)
        .await?;

    // The reference client uploads in parallel batches; simulate that.
    let mut tasks = Vec::new();
    for i in 0..total_chunks {
        let manager = std::sync::Arc::clone(&manager);
        let session_id = session_id.clone();
        tasks.push(tokio::spawn(async move {
            manager.put_chunk(&session_id, i, &vec![i as u8; 32]).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    let result = manager.finalize(&session_id).await?;
    let bytes = std::fs::read(&result.path)?;
    let expected: Vec<u8> = (0..total_chunks).flat_map(|i| vec![i as u8; 32]).collect();
    assert_eq!(bytes, expected);

    Ok(())
}

#[tokio::test]
async fn finalize_with_missing_chunks_fails_and_leaves_no_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    let session_id = manager.init_session("room-c", "user-1", 300, 3).await?;
    manager.put_chunk(&session_id, 0, b"aaa").await?;
    manager.put_chunk(&session_id, 2, b"ccc").await?;

    match manager.finalize(&session_id).await {
        Err(StudioError::MissingChunks { received, expected }) => {
            assert_eq!(received, 2);
            assert_eq!(expected, 3);
        }
        other => panic!("expected MissingChunks, got {other:?}"),
    }

    let output = canonical_capture_path(temp_dir.path(), "room-c", "user-1");
    assert!(!output.exists(), "no partial output file may be produced");

    // The session survives a failed finalize: upload the gap and retry.
    manager.put_chunk(&session_id, 1, b"bbb").await?;
    let result = manager.finalize(&session_id).await?;
    assert_eq!(std::fs::read(&result.path)?, b"aaabbbccc");

    Ok(())
}

#[tokio::test]
async fn finalize_is_not_repeatable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    let session_id = manager.init_session("room-d", "user-1", 3, 1).await?;
    manager.put_chunk(&session_id, 0, b"xyz").await?;
    manager.finalize(&session_id).await?;

    assert!(matches!(
        manager.finalize(&session_id).await,
        Err(StudioError::SessionNotFound)
    ));
    assert_eq!(manager.session_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn init_session_rejects_bad_parameters() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    assert!(matches!(
        manager.init_session("room-e", "user-1", 100, 0).await,
        Err(StudioError::InvalidRequest(_))
    ));
    assert!(matches!(
        manager.init_session("room-e", "user-1", 0, 4).await,
        Err(StudioError::InvalidRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn out_of_range_chunk_index_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    let session_id = manager.init_session("room-f", "user-1", 10, 2).await?;
    assert!(matches!(
        manager.put_chunk(&session_id, 2, b"oops").await,
        Err(StudioError::InvalidRequest(_))
    ));
    assert!(matches!(
        manager.put_chunk("no-such-session", 0, b"oops").await,
        Err(StudioError::SessionNotFound)
    ));

    Ok(())
}

#[tokio::test]
async fn single_shot_upload_lands_at_the_canonical_location() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    // Chunked path for one user.
    let session_id = manager.init_session("room-g", "user-1", 6, 2).await?;
    manager.put_chunk(&session_id, 0, b"abc").await?;
    manager.put_chunk(&session_id, 1, b"def").await?;
    let chunked = manager.finalize(&session_id).await?;

    // Single-shot path for another; the merge stage must not be able to
    // tell them apart by location.
    let single = manager.put_complete("room-g", "user-2", b"abcdef").await?;

    assert_eq!(
        chunked.path,
        canonical_capture_path(temp_dir.path(), "room-g", "user-1")
    );
    assert_eq!(
        single.path,
        canonical_capture_path(temp_dir.path(), "room-g", "user-2")
    );
    assert_eq!(std::fs::read(&single.path)?, b"abcdef");

    assert!(matches!(
        manager.put_complete("room-g", "user-3", b"").await,
        Err(StudioError::InvalidRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn expired_sessions_are_swept_with_their_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let manager = ChunkUploadManager::new(temp_dir.path().to_path_buf());

    let session_id = manager.init_session("room-h", "user-1", 10, 4).await?;
    manager.put_chunk(&session_id, 0, b"aa").await?;
    manager.put_chunk(&session_id, 1, b"bb").await?;

    // Nothing is old enough yet.
    assert_eq!(manager.sweep_expired(chrono::Duration::hours(1)).await, 0);
    assert_eq!(manager.session_count().await, 1);

    // A zero cutoff makes everything stale.
    assert_eq!(manager.sweep_expired(chrono::Duration::zero()).await, 1);
    assert_eq!(manager.session_count().await, 0);
    assert!(matches!(
        manager.put_chunk(&session_id, 2, b"cc").await,
        Err(StudioError::SessionNotFound)
    ));

    let chunk_dir = temp_dir.path().join("room-h").join("user-1");
    assert!(!chunk_dir.join("chunk_0.webm").exists());
    assert!(!chunk_dir.join("chunk_1.webm").exists());

    Ok(())
}
