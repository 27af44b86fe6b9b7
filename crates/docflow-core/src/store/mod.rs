//! Job record store: the single serialization point for stage ownership.
//!
//! `compare_and_advance` is the only way a job moves along the pipeline.
//! It succeeds only while the stored stage matches the caller's
//! expectation, so of two racing deliveries exactly one wins and the
//! other sees a `Conflict` it can treat as already-done.

mod memory;

pub use memory::MemoryJobStore;

use async_trait::async_trait;

use crate::artifact::ArtifactRef;
use crate::error::StoreError;
use crate::job::{Job, JobStage, Stage};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job at `created` with a fresh id.
    async fn create(&self, document_ref: ArtifactRef) -> Result<Job, StoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Advance the job from `expected` to `new_stage`, recording the
    /// artifact produced by the owning stage. `new_stage` must be the
    /// successor of `expected`; the call fails with [`StoreError::Conflict`]
    /// when the stored stage has already moved.
    async fn compare_and_advance(
        &self,
        job_id: &str,
        expected: JobStage,
        new_stage: JobStage,
        artifact: Option<ArtifactRef>,
    ) -> Result<Job, StoreError>;

    /// Mark the owning stage as running. Conflict when `stage` no longer
    /// owns the job.
    async fn mark_running(&self, job_id: &str, stage: Stage) -> Result<(), StoreError>;

    /// Record one spent attempt for `stage`, leaving the job pending at
    /// the same stage. Returns the new persisted count.
    async fn record_attempt(&self, job_id: &str, stage: Stage) -> Result<u32, StoreError>;

    /// Terminal failure: records the error and stops the pipeline for
    /// this job. Nothing downstream ever observes it again.
    async fn mark_failed(&self, job_id: &str, stage: Stage, error: &str) -> Result<(), StoreError>;

    /// External cancellation. Workers check this before starting work.
    async fn set_poisoned(&self, job_id: &str) -> Result<(), StoreError>;
}
