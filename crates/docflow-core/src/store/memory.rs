//! In-memory job store for tests and single-process runs.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::artifact::ArtifactRef;
use crate::error::StoreError;
use crate::job::{Job, JobStage, JobStatus, Stage};

use super::JobStore;

/// Reference implementation. All mutation happens under one write lock,
/// which makes `compare_and_advance` a true compare-and-swap.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned<'a>(
        jobs: &'a mut HashMap<String, Job>,
        job_id: &str,
        stage: Stage,
    ) -> Result<&'a mut Job, StoreError> {
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if job.stage != stage.job_stage() {
            return Err(StoreError::Conflict {
                job_id: job_id.to_string(),
                expected: stage.job_stage(),
                found: job.stage,
            });
        }
        Ok(job)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, document_ref: ArtifactRef) -> Result<Job, StoreError> {
        let job = Job::new(document_ref);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn compare_and_advance(
        &self,
        job_id: &str,
        expected: JobStage,
        new_stage: JobStage,
        artifact: Option<ArtifactRef>,
    ) -> Result<Job, StoreError> {
        if expected.successor() != Some(new_stage) {
            return Err(StoreError::Other(anyhow!(
                "non-monotonic advance for job {job_id}: {expected} -> {new_stage}"
            )));
        }

        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        if job.stage != expected {
            return Err(StoreError::Conflict {
                job_id: job_id.to_string(),
                expected,
                found: job.stage,
            });
        }

        match (expected.owning_stage(), artifact) {
            (Some(stage), Some(reference)) => {
                job.artifacts.insert(stage, reference);
            }
            (None, None) => {}
            (Some(stage), None) => {
                return Err(StoreError::Other(anyhow!(
                    "advance past {stage} for job {job_id} without an artifact"
                )));
            }
            (None, Some(_)) => {
                return Err(StoreError::Other(anyhow!(
                    "artifact recorded for job {job_id} before any stage ran"
                )));
            }
        }

        job.stage = new_stage;
        job.status = if new_stage == JobStage::Done {
            JobStatus::Succeeded
        } else {
            JobStatus::Pending
        };
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn mark_running(&self, job_id: &str, stage: Stage) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = Self::owned(&mut jobs, job_id, stage)?;
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn record_attempt(&self, job_id: &str, stage: Stage) -> Result<u32, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = Self::owned(&mut jobs, job_id, stage)?;
        let count = job.attempts.entry(stage).or_insert(0);
        *count += 1;
        let count = *count;
        job.status = JobStatus::Pending;
        job.updated_at = Utc::now();
        Ok(count)
    }

    async fn mark_failed(&self, job_id: &str, stage: Stage, error: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = Self::owned(&mut jobs, job_id, stage)?;
        job.stage = JobStage::Failed;
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_poisoned(&self, job_id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        job.poisoned = true;
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn upload_ref() -> ArtifactRef {
        ArtifactRef::new("blake3:upload")
    }

    fn stage_ref(stage: Stage) -> ArtifactRef {
        ArtifactRef::new(format!("blake3:{stage}"))
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();

        let loaded = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.job_id, job.job_id);
        assert_eq!(loaded.stage, JobStage::Created);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn advance_walks_the_full_topology() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();

        store
            .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
            .await
            .unwrap();

        let mut position = JobStage::Ingesting;
        while let Some(stage) = position.owning_stage() {
            let next = position.successor().unwrap();
            let updated = store
                .compare_and_advance(&job.job_id, position, next, Some(stage_ref(stage)))
                .await
                .unwrap();
            assert_eq!(updated.stage, next);
            position = next;
        }

        let done = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(done.stage, JobStage::Done);
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.artifacts.len(), 5);
    }

    #[tokio::test]
    async fn stale_expectation_is_a_conflict() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();
        store
            .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
            .await
            .unwrap();
        store
            .compare_and_advance(
                &job.job_id,
                JobStage::Ingesting,
                JobStage::Ocr,
                Some(stage_ref(Stage::Ingest)),
            )
            .await
            .unwrap();

        // A redelivered ingest completion arrives after the fact.
        let result = store
            .compare_and_advance(
                &job.job_id,
                JobStage::Ingesting,
                JobStage::Ocr,
                Some(stage_ref(Stage::Ingest)),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn concurrent_advance_has_exactly_one_winner() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.create(upload_ref()).await.unwrap();
        store
            .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let job_id = job.job_id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_advance(
                        &job_id,
                        JobStage::Ingesting,
                        JobStage::Ocr,
                        Some(stage_ref(Stage::Ingest)),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn skipping_a_stage_is_rejected() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();
        let result = store
            .compare_and_advance(
                &job.job_id,
                JobStage::Created,
                JobStage::Chunking,
                Some(stage_ref(Stage::Chunk)),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Other(_))));
    }

    #[tokio::test]
    async fn attempts_accumulate_per_stage() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();
        store
            .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
            .await
            .unwrap();

        assert_eq!(store.record_attempt(&job.job_id, Stage::Ingest).await.unwrap(), 1);
        assert_eq!(store.record_attempt(&job.job_id, Stage::Ingest).await.unwrap(), 2);

        let loaded = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.attempt_count(Stage::Ingest), 2);
        assert_eq!(loaded.attempt_count(Stage::Ocr), 0);
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn mark_failed_is_terminal() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();
        store
            .compare_and_advance(&job.job_id, JobStage::Created, JobStage::Ingesting, None)
            .await
            .unwrap();

        store
            .mark_failed(&job.job_id, Stage::Ingest, "unsupported document format")
            .await
            .unwrap();

        let loaded = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.stage, JobStage::Failed);
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("unsupported document format"));

        // Nothing owns a failed job; further mutation conflicts.
        let result = store.mark_running(&job.job_id, Stage::Ingest).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn poisoning_flags_the_record() {
        let store = MemoryJobStore::new();
        let job = store.create(upload_ref()).await.unwrap();
        store.set_poisoned(&job.job_id).await.unwrap();
        assert!(store.get(&job.job_id).await.unwrap().unwrap().poisoned);
    }
}
