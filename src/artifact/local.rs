use super::ArtifactStore;
use crate::error::{StudioError, StudioResult};
use base64::Engine;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Local-disk artifact store.
///
/// Artifacts land under a root directory that the HTTP layer serves
/// statically; signed URLs carry an expiry and an HMAC-style token over
/// `(key, expires)` so a leaked link dies on schedule.
pub struct LocalArtifactStore {
    root: PathBuf,
    base_url: String,
    secret: String,
}

impl LocalArtifactStore {
    pub fn new(root: PathBuf, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(key.as_bytes());
        hasher.update(expires.to_be_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Check a signed URL's token. False once `expires` has passed or if
    /// the token does not match the key.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        self.signature(key, expires) == signature
    }

    /// Extract the storage key from one of this store's public URLs.
    pub fn key_of(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{}/", self.base_url))
            .map(|k| k.split('?').next().unwrap_or(k).to_string())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StudioResult<String> {
        let target = self.root.join(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StudioError::ArtifactStoreFailure(e.to_string()))?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| StudioError::ArtifactStoreFailure(e.to_string()))?;

        info!(
            "stored artifact {} ({}) at {}",
            key,
            content_type,
            target.display()
        );
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StudioResult<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.signature(key, expires);
        Ok(format!(
            "{}/{}?expires={}&sig={}",
            self.base_url, key, expires, signature
        ))
    }
}
