//! Pipeline assembly: job submission and stage worker pools.
//!
//! ```text
//! submit()
//!    │
//!    ▼
//! ingest ──► ocr ──► chunk ──► embeddings ──► vectors ──► done
//! ```
//!
//! Coordination lives inside each stage's commit path; this module only
//! creates jobs and wires executors to worker pools.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clients::{Embedder, OcrEngine, VectorIndex};
use crate::config::Config;
use crate::job::{Job, JobStage, Stage, TaskMessage};
use crate::progress::ProgressUpdate;
use crate::stages::{
    ChunkStage, EmbedStage, IngestStage, OcrStage, StageExecutor, VectorizeStage,
};
use crate::worker::{spawn_stage_workers, WorkerContext};

/// External collaborators required by the transformation stages.
#[derive(Clone)]
pub struct Collaborators {
    pub ocr: Arc<dyn OcrEngine>,
    pub embedder: Arc<dyn Embedder>,
    pub vectors: Arc<dyn VectorIndex>,
}

/// Build the executor for one stage.
pub fn executor_for(
    stage: Stage,
    collaborators: &Collaborators,
    config: &Config,
) -> Result<Arc<dyn StageExecutor>> {
    Ok(match stage {
        Stage::Ingest => Arc::new(IngestStage::new(&config.limits)),
        Stage::Ocr => Arc::new(OcrStage::new(collaborators.ocr.clone())),
        Stage::Chunk => Arc::new(ChunkStage::new(&config.chunking)?),
        Stage::Embed => Arc::new(EmbedStage::new(collaborators.embedder.clone())),
        Stage::Vectorize => Arc::new(VectorizeStage::new(collaborators.vectors.clone())),
    })
}

/// Create a job for an uploaded document and hand it to the ingest queue.
///
/// Ownership passes to the ingest stage with the first task; everything
/// after that is driven by the workers.
pub async fn submit(ctx: &WorkerContext, document: Bytes) -> Result<Job> {
    let document_ref = ctx
        .artifacts
        .store_upload(document)
        .await
        .context("store upload")?;
    let job = ctx.jobs.create(document_ref).await?;
    let job = ctx
        .jobs
        .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
        .await?;

    let task = TaskMessage::new(&job.job_id, Stage::Ingest);
    ctx.queue
        .enqueue(Stage::Ingest.queue_name(), &task)
        .await
        .context("enqueue ingest task")?;
    ctx.progress
        .apply(ProgressUpdate::Queued(Stage::Ingest))
        .await;

    tracing::info!(job_id = %job.job_id, document_ref = %job.document_ref, "Job submitted");
    Ok(job)
}

/// Spawn worker pools for the given stages.
pub fn spawn_pipeline(
    ctx: &WorkerContext,
    collaborators: &Collaborators,
    config: &Config,
    stages: &[Stage],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(stages.len() * concurrency);
    for &stage in stages {
        let executor = executor_for(stage, collaborators, config)?;
        handles.extend(spawn_stage_workers(
            concurrency,
            ctx.clone(),
            executor,
            cancel.child_token(),
        ));
    }

    tracing::info!(
        stages = stages.len(),
        workers_per_stage = concurrency,
        "Pipeline started"
    );
    Ok(handles)
}
