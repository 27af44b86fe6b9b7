//! In-process progress counters for the pipeline.
//!
//! Advisory only: the job record store is the authoritative operator
//! surface. These counters give a worker process a cheap local view for
//! periodic logging.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::job::Stage;

/// Counters for a single stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageProgress {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StageProgress {
    pub fn total(&self) -> usize {
        self.pending + self.active + self.completed + self.failed
    }

    pub fn is_active(&self) -> bool {
        self.pending > 0 || self.active > 0
    }
}

/// Counters across all pipeline stages.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineProgress {
    pub ingest: StageProgress,
    pub ocr: StageProgress,
    pub chunk: StageProgress,
    pub embed: StageProgress,
    pub vectorize: StageProgress,
}

impl PipelineProgress {
    fn stage_mut(&mut self, stage: Stage) -> &mut StageProgress {
        match stage {
            Stage::Ingest => &mut self.ingest,
            Stage::Ocr => &mut self.ocr,
            Stage::Chunk => &mut self.chunk,
            Stage::Embed => &mut self.embed,
            Stage::Vectorize => &mut self.vectorize,
        }
    }

    pub fn stage(&self, stage: Stage) -> StageProgress {
        match stage {
            Stage::Ingest => self.ingest,
            Stage::Ocr => self.ocr,
            Stage::Chunk => self.chunk,
            Stage::Embed => self.embed,
            Stage::Vectorize => self.vectorize,
        }
    }

    pub fn is_active(&self) -> bool {
        [self.ingest, self.ocr, self.chunk, self.embed, self.vectorize]
            .iter()
            .any(StageProgress::is_active)
    }

    pub fn completed_total(&self) -> usize {
        [self.ingest, self.ocr, self.chunk, self.embed, self.vectorize]
            .iter()
            .map(|s| s.completed)
            .sum()
    }

    pub fn failed_total(&self) -> usize {
        [self.ingest, self.ocr, self.chunk, self.embed, self.vectorize]
            .iter()
            .map(|s| s.failed)
            .sum()
    }
}

/// Progress update from workers.
#[derive(Debug, Clone, Copy)]
pub enum ProgressUpdate {
    /// Task enqueued (-> pending).
    Queued(Stage),
    /// Worker picked the task up (pending -> active).
    Started(Stage),
    /// Stage committed (active -> completed).
    Completed(Stage),
    /// Terminal failure (active -> failed).
    Failed(Stage),
    /// Transient failure, re-enqueued (active -> pending).
    Retried(Stage),
}

/// Tracks progress for one worker process.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<PipelineProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, update: ProgressUpdate) {
        let mut progress = self.inner.write().await;
        match update {
            ProgressUpdate::Queued(stage) => {
                progress.stage_mut(stage).pending += 1;
            }
            ProgressUpdate::Started(stage) => {
                let stage = progress.stage_mut(stage);
                stage.pending = stage.pending.saturating_sub(1);
                stage.active += 1;
            }
            ProgressUpdate::Completed(stage) => {
                let stage = progress.stage_mut(stage);
                stage.active = stage.active.saturating_sub(1);
                stage.completed += 1;
            }
            ProgressUpdate::Failed(stage) => {
                let stage = progress.stage_mut(stage);
                stage.active = stage.active.saturating_sub(1);
                stage.failed += 1;
            }
            ProgressUpdate::Retried(stage) => {
                let stage = progress.stage_mut(stage);
                stage.active = stage.active.saturating_sub(1);
                stage.pending += 1;
            }
        }
    }

    pub async fn snapshot(&self) -> PipelineProgress {
        *self.inner.read().await
    }
}
