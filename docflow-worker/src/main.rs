//! docflow worker process.
//!
//! Binds one queue (or all of them for single-node runs), spawns the
//! stage worker pools, and runs until interrupted. Collaborator services
//! are configured through `DOCFLOW_*` environment variables; CLI flags
//! override the retry knobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use docflow_core::clients::{
    HttpEmbedder, HttpOcr, HttpVectorIndex, MockEmbedder, MockOcr, MockVectorIndex,
};
use docflow_core::{
    spawn_pipeline, submit, Collaborators, Config, FsArtifactStore, MemoryJobStore, MemoryQueue,
    ProgressTracker, Stage, WorkerContext, STAGE_ORDER,
};

#[derive(Parser, Debug)]
#[command(name = "docflow-worker")]
#[command(about = "Queue worker for the docflow document pipeline")]
struct Args {
    /// Queue to bind: ingest, ocr, chunk, embeddings, or vectors.
    /// Defaults to all stages in one process.
    #[arg(long)]
    queue: Option<String>,

    /// Worker slots per bound stage.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Maximum attempts before a transient failure becomes terminal.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Base backoff delay in milliseconds.
    #[arg(long)]
    backoff_base_ms: Option<u64>,

    /// Backoff cap in milliseconds.
    #[arg(long)]
    backoff_cap_ms: Option<u64>,

    /// Documents to submit on startup (local runs).
    #[arg(long)]
    submit: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docflow_core=info".parse().expect("valid directive"))
                .add_directive("docflow_worker=info".parse().expect("valid directive")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    if let Err(e) = rt.block_on(run(args)) {
        tracing::error!(error = %e, "Worker failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load_or_default();
    config.ensure_dirs().context("create data directories")?;
    if let Some(n) = args.max_attempts {
        config.retry.max_attempts = n;
    }
    if let Some(ms) = args.backoff_base_ms {
        config.retry.base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = args.backoff_cap_ms {
        config.retry.max_delay = Duration::from_millis(ms);
    }

    let stages: Vec<Stage> = match args.queue.as_deref() {
        None | Some("all") => STAGE_ORDER.to_vec(),
        Some(name) => {
            vec![Stage::for_queue(name).with_context(|| format!("unknown queue: {name}"))?]
        }
    };

    tracing::info!(data_dir = %config.data_dir.display(), "Starting docflow worker");

    let ctx = WorkerContext {
        queue: Arc::new(MemoryQueue::new(config.visibility_timeout)),
        jobs: Arc::new(MemoryJobStore::new()),
        artifacts: Arc::new(FsArtifactStore::open(&config.artifacts_dir)?),
        retry: config.retry.clone(),
        progress: ProgressTracker::new(),
    };
    let collaborators = build_collaborators(&config)?;

    let cancel = CancellationToken::new();
    let handles = spawn_pipeline(
        &ctx,
        &collaborators,
        &config,
        &stages,
        args.concurrency,
        &cancel,
    )?;

    for path in &args.submit {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let job = submit(&ctx, Bytes::from(data)).await?;
        tracing::info!(job_id = %job.job_id, path = %path.display(), "Submitted document");
    }

    spawn_progress_logger(ctx.progress.clone(), cancel.child_token());

    tracing::info!("Worker running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("listen for Ctrl+C")?;

    tracing::info!("Shutting down...");
    cancel.cancel();
    futures::future::join_all(handles).await;
    Ok(())
}

fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let ocr: Arc<dyn docflow_core::clients::OcrEngine> = match &config.ocr_url {
        Some(url) => Arc::new(HttpOcr::new(url)?),
        None => {
            tracing::warn!("DOCFLOW_OCR_URL not set; only plain-text documents will extract");
            Arc::new(MockOcr)
        }
    };

    let embedder: Arc<dyn docflow_core::clients::Embedder> = match &config.embedder_url {
        Some(url) => Arc::new(HttpEmbedder::new(
            url,
            &config.embedding_model,
            config.embedding_dimensions,
        )?),
        None => {
            tracing::warn!("DOCFLOW_EMBEDDER_URL not set; using dummy vectors");
            Arc::new(MockEmbedder {
                dimensions: config.embedding_dimensions,
            })
        }
    };

    let vectors: Arc<dyn docflow_core::clients::VectorIndex> = match &config.vector_url {
        Some(url) => Arc::new(HttpVectorIndex::new(url, &config.vector_class)?),
        None => {
            tracing::warn!("DOCFLOW_VECTOR_URL not set; vectors will not leave this process");
            Arc::new(MockVectorIndex::new())
        }
    };

    Ok(Collaborators {
        ocr,
        embedder,
        vectors,
    })
}

fn spawn_progress_logger(progress: ProgressTracker, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = interval.tick() => {
                    let snapshot = progress.snapshot().await;
                    if snapshot.is_active() {
                        tracing::info!(
                            completed = snapshot.completed_total(),
                            failed = snapshot.failed_total(),
                            ingest_pending = snapshot.ingest.pending,
                            ocr_pending = snapshot.ocr.pending,
                            chunk_pending = snapshot.chunk.pending,
                            embed_pending = snapshot.embed.pending,
                            vectorize_pending = snapshot.vectorize.pending,
                            "Pipeline progress"
                        );
                    }
                }
            }
        }
    });
}
