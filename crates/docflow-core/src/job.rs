//! Job records, stage topology, and the task wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRef;

/// Processing stage in the pipeline.
///
/// Declaration order is pipeline order; `next()` walks [`STAGE_ORDER`], so
/// inserting a stage means editing the table, not the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingest,
    Ocr,
    Chunk,
    Embed,
    Vectorize,
}

/// Stages in pipeline order.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::Ingest,
    Stage::Ocr,
    Stage::Chunk,
    Stage::Embed,
    Stage::Vectorize,
];

impl Stage {
    /// The stage that follows this one, or `None` for the terminal stage.
    pub fn next(self) -> Option<Stage> {
        let position = STAGE_ORDER.iter().position(|s| *s == self)?;
        STAGE_ORDER.get(position + 1).copied()
    }

    /// The stage whose artifact this stage consumes, or `None` for ingest
    /// (which reads the original upload).
    pub fn prev(self) -> Option<Stage> {
        let position = STAGE_ORDER.iter().position(|s| *s == self)?;
        position.checked_sub(1).and_then(|p| STAGE_ORDER.get(p)).copied()
    }

    /// Broker queue this stage's worker pool binds to.
    ///
    /// The `embeddings`/`vectors` names follow the broker routing table of
    /// the deployed system; the others match the stage name.
    pub fn queue_name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Ocr => "ocr",
            Stage::Chunk => "chunk",
            Stage::Embed => "embeddings",
            Stage::Vectorize => "vectors",
        }
    }

    /// Resolve a queue name back to its stage (worker `--queue` binding).
    pub fn for_queue(name: &str) -> Option<Stage> {
        STAGE_ORDER.iter().copied().find(|s| s.queue_name() == name)
    }

    /// The job position marker while this stage owns the job.
    pub fn job_stage(self) -> JobStage {
        match self {
            Stage::Ingest => JobStage::Ingesting,
            Stage::Ocr => JobStage::Ocr,
            Stage::Chunk => JobStage::Chunking,
            Stage::Embed => JobStage::Embedding,
            Stage::Vectorize => JobStage::Vectorizing,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Ingest => write!(f, "ingest"),
            Stage::Ocr => write!(f, "ocr"),
            Stage::Chunk => write!(f, "chunk"),
            Stage::Embed => write!(f, "embed"),
            Stage::Vectorize => write!(f, "vectorize"),
        }
    }
}

/// Position of a job along the pipeline.
///
/// `Created` exists only between job creation and the first enqueue;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Created,
    Ingesting,
    Ocr,
    Chunking,
    Embedding,
    Vectorizing,
    Done,
    Failed,
}

impl JobStage {
    /// The position that follows this one, or `None` for terminal positions.
    pub fn successor(self) -> Option<JobStage> {
        match self {
            JobStage::Created => Some(JobStage::Ingesting),
            JobStage::Ingesting => Some(JobStage::Ocr),
            JobStage::Ocr => Some(JobStage::Chunking),
            JobStage::Chunking => Some(JobStage::Embedding),
            JobStage::Embedding => Some(JobStage::Vectorizing),
            JobStage::Vectorizing => Some(JobStage::Done),
            JobStage::Done | JobStage::Failed => None,
        }
    }

    /// The stage that owns a job at this position, if any.
    pub fn owning_stage(self) -> Option<Stage> {
        match self {
            JobStage::Ingesting => Some(Stage::Ingest),
            JobStage::Ocr => Some(Stage::Ocr),
            JobStage::Chunking => Some(Stage::Chunk),
            JobStage::Embedding => Some(Stage::Embed),
            JobStage::Vectorizing => Some(Stage::Vectorize),
            JobStage::Created | JobStage::Done | JobStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Created => write!(f, "created"),
            JobStage::Ingesting => write!(f, "ingesting"),
            JobStage::Ocr => write!(f, "ocr"),
            JobStage::Chunking => write!(f, "chunking"),
            JobStage::Embedding => write!(f, "embedding"),
            JobStage::Vectorizing => write!(f, "vectorizing"),
            JobStage::Done => write!(f, "done"),
            JobStage::Failed => write!(f, "failed"),
        }
    }
}

/// Status of the stage currently owning the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One document's traversal of the pipeline.
///
/// Mutated only through the job store; exactly one stage owns the record
/// at a time and ownership transfers via `compare_and_advance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique, immutable, assigned at creation.
    pub job_id: String,
    /// Opaque reference to the original upload in the artifact store.
    pub document_ref: ArtifactRef,
    pub stage: JobStage,
    pub status: JobStatus,
    /// Attempts spent per stage, for the retry policy. Persisted here so
    /// redelivered messages cannot reset the count.
    #[serde(default)]
    pub attempts: BTreeMap<Stage, u32>,
    /// Append-only: each stage records exactly one artifact before the job
    /// advances past it.
    #[serde(default)]
    pub artifacts: BTreeMap<Stage, ArtifactRef>,
    /// Last failure reason; populated only when the job has failed.
    pub error: Option<String>,
    /// External cancellation flag; workers skip poisoned jobs.
    #[serde(default)]
    pub poisoned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(document_ref: ArtifactRef) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            document_ref,
            stage: JobStage::Created,
            status: JobStatus::Pending,
            attempts: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            error: None,
            poisoned: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempt_count(&self, stage: Stage) -> u32 {
        self.attempts.get(&stage).copied().unwrap_or(0)
    }

    pub fn artifact(&self, stage: Stage) -> Option<&ArtifactRef> {
        self.artifacts.get(&stage)
    }
}

/// The unit of queue transport.
///
/// Workers never decide from this alone; the persisted job record is
/// authoritative and redelivered duplicates collapse to no-ops there.
/// Unknown fields are ignored on deserialize so the format can grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub job_id: String,
    pub target_stage: Stage,
    #[serde(default)]
    pub attempt_number: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskMessage {
    /// First delivery for a stage.
    pub fn new(job_id: &str, target_stage: Stage) -> Self {
        Self {
            job_id: job_id.to_string(),
            target_stage,
            attempt_number: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// Re-enqueue of the same stage after a transient failure.
    pub fn retry(&self, attempt_number: u32) -> Self {
        Self {
            job_id: self.job_id.clone(),
            target_stage: self.target_stage,
            attempt_number,
            enqueued_at: Utc::now(),
        }
    }
}
