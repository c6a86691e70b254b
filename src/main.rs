use anyhow::{Context, Result};
use clap::Parser;
use duet_studio::pipeline::{MergePipeline, MergeWorkerPool};
use duet_studio::recording::{MemoryRecordingStore, RecordingCoordinator};
use duet_studio::signaling::{RoomBus, SignalingRelay, SocketDirectory};
use duet_studio::upload::ChunkUploadManager;
use duet_studio::{
    create_router, AppState, Config, LocalArtifactStore, SessionRegistry, TokenTableResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "duet-studio", about = "Multi-party recording server")]
struct Args {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/duet-studio")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let uploads_root = PathBuf::from(&cfg.storage.uploads_path);
    let artifacts_root = PathBuf::from(&cfg.artifact.store_path);
    tokio::fs::create_dir_all(&uploads_root)
        .await
        .context("failed to create uploads directory")?;
    tokio::fs::create_dir_all(&artifacts_root)
        .await
        .context("failed to create artifacts directory")?;

    let registry = Arc::new(SessionRegistry::new());
    let bus = Arc::new(RoomBus::new());
    let directory = Arc::new(SocketDirectory::new());
    let relay = Arc::new(SignalingRelay::new(Arc::clone(&directory)));
    let uploads = Arc::new(ChunkUploadManager::new(uploads_root.clone()));
    let recordings = Arc::new(MemoryRecordingStore::new());
    let artifacts = Arc::new(LocalArtifactStore::new(
        artifacts_root.clone(),
        cfg.artifact.base_url.clone(),
        cfg.artifact.url_secret.clone(),
    ));
    let identity = Arc::new(TokenTableResolver::new(
        cfg.auth
            .tokens
            .iter()
            .map(|t| (t.token.clone(), t.user_id.clone(), t.username.clone())),
    ));

    let pipeline = Arc::new(MergePipeline::new(
        uploads_root.clone(),
        artifacts.clone() as Arc<dyn duet_studio::ArtifactStore>,
    ));
    let coordinator = Arc::new(RecordingCoordinator::new(
        Arc::clone(&registry),
        recordings.clone(),
        pipeline,
        Arc::clone(&bus),
        MergeWorkerPool::new(cfg.recording.max_concurrent_merges),
        uploads_root.clone(),
        Duration::from_millis(cfg.recording.start_lead_ms),
        Duration::from_secs(cfg.recording.settle_grace_secs),
    ));

    // Periodically drop upload sessions that were never finalized.
    let sweep_uploads = Arc::clone(&uploads);
    let max_age = chrono::Duration::seconds(cfg.storage.session_max_age_secs as i64);
    let sweep_every = Duration::from_secs(cfg.storage.session_max_age_secs.max(60));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweep_every);
        loop {
            tick.tick().await;
            let swept = sweep_uploads.sweep_expired(max_age).await;
            if swept > 0 {
                info!("swept {} expired upload session(s)", swept);
            }
        }
    });

    let state = AppState {
        registry,
        bus,
        directory,
        relay,
        uploads,
        coordinator,
        recordings,
        artifacts,
        identity,
        artifact_base_url: cfg.artifact.base_url.clone(),
        signed_url_ttl: Duration::from_secs(cfg.artifact.signed_url_ttl_secs),
    };

    let app = create_router(state, &artifacts_root);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
