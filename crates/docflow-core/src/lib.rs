//! docflow core - queue-driven document processing pipeline.
//!
//! A job carries one uploaded document through a fixed linear topology,
//! one worker pool per stage, coordinated only through the task queue and
//! the job record store:
//!
//! ```text
//! submit()            ingest    ocr    chunk   embeddings   vectors
//! ───────             ──────    ───    ─────   ──────────   ───────
//! store upload          │        │       │         │           │
//! create job ──────────►│        │       │         │           │
//!                       ▼        ▼       ▼         ▼           ▼
//!                     validate  extract  split    embed      upsert
//!                       │        │       │         │           │
//!                       └──► artifact write + compare_and_advance
//!                            + enqueue next + ack, per stage
//! ```
//!
//! Delivery is at-least-once; workers decide from the persisted job
//! record, so duplicates collapse to acknowledged no-ops. Transient
//! failures retry with capped exponential backoff; validation failures
//! and exhausted retries are terminal and stop the job's pipeline.

pub mod artifact;
pub mod chunker;
pub mod clients;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod stages;
pub mod store;
pub mod worker;

pub use artifact::{ArtifactRef, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use config::Config;
pub use error::{StageError, StoreError};
pub use job::{Job, JobStage, JobStatus, Stage, TaskMessage, STAGE_ORDER};
pub use pipeline::{spawn_pipeline, submit, Collaborators};
pub use progress::{PipelineProgress, ProgressTracker};
pub use queue::{Delivery, MemoryQueue, Receipt, TaskQueue};
pub use retry::RetryConfig;
pub use store::{JobStore, MemoryJobStore};
pub use worker::{spawn_stage_workers, Outcome, StageWorker, WorkerContext};
