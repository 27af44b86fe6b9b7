//! Failure taxonomy for stage execution and the job store.

use thiserror::Error;

use crate::job::JobStage;

/// A stage transformation failure, classified for the retry policy.
#[derive(Debug, Error)]
pub enum StageError {
    /// Worth retrying with backoff: timeouts, connection failures,
    /// overloaded services, resource pressure.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Never retried: the document itself cannot be processed.
    #[error("invalid document: {0}")]
    Validation(String),
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Job record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    /// The stored stage no longer matches what the caller expected.
    /// Workers treat this as a completed no-op: another delivery of the
    /// same task already advanced the job.
    #[error("stage conflict for job {job_id}: expected {expected}, found {found}")]
    Conflict {
        job_id: String,
        expected: JobStage,
        found: JobStage,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
