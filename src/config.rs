use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-room upload staging
    pub uploads_path: String,
    /// Upload sessions older than this are swept
    pub session_max_age_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    /// Lead time added to "now" for the synchronized start instant
    pub start_lead_ms: u64,
    /// Grace window between stop and processing, letting late uploads land
    pub settle_grace_secs: u64,
    /// Upper bound on concurrent merge jobs
    pub max_concurrent_merges: usize,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactConfig {
    /// Directory backing the local artifact store
    pub store_path: String,
    /// Public base URL under which stored artifacts are reachable
    pub base_url: String,
    /// Secret for signed URL tokens
    pub url_secret: String,
    /// Default signed URL lifetime
    pub signed_url_ttl_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// Static token table consumed by the identity resolver
    #[serde(default)]
    pub tokens: Vec<StaticToken>,
}

#[derive(Debug, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
