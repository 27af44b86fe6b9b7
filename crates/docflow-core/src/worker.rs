//! Stage worker: the dequeue → process → commit → acknowledge loop.
//!
//! Workers are stateless; everything they decide comes from the persisted
//! job record, never from the message alone, so at-least-once redelivery
//! collapses to no-ops. A stage's side effects are one artifact write,
//! one record transition, and at most one enqueue, acknowledged only
//! once all of them are durable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArtifactRef, ArtifactStore};
use crate::error::{StageError, StoreError};
use crate::job::{Job, JobStage, JobStatus, Stage, TaskMessage};
use crate::progress::{ProgressTracker, ProgressUpdate};
use crate::queue::TaskQueue;
use crate::retry::RetryConfig;
use crate::stages::StageExecutor;
use crate::store::JobStore;

/// Shared handles a stage worker needs.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn TaskQueue>,
    pub jobs: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub retry: RetryConfig,
    pub progress: ProgressTracker,
}

/// What `process` did with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stage committed; the next task is enqueued (or the job is done).
    Advanced,
    /// Transient failure; the same stage is re-enqueued with backoff.
    Retried,
    /// Terminal failure recorded; nothing enqueued downstream.
    Failed,
    /// Idempotent no-op: duplicate, stale, poisoned, or lost race.
    Skipped,
}

pub struct StageWorker {
    ctx: WorkerContext,
    executor: Arc<dyn StageExecutor>,
}

impl StageWorker {
    pub fn new(ctx: WorkerContext, executor: Arc<dyn StageExecutor>) -> Self {
        Self { ctx, executor }
    }

    pub fn stage(&self) -> Stage {
        self.executor.stage()
    }

    /// Consume the stage's queue until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let queue_name = self.stage().queue_name();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!(queue = %queue_name, "Stage worker cancelled");
                    break;
                }

                delivery = self.ctx.queue.recv(queue_name) => {
                    let delivery = match delivery {
                        Ok(d) => d,
                        Err(e) => {
                            tracing::error!(queue = %queue_name, error = %e, "Queue receive failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    match self.process(&delivery.task).await {
                        Ok(_) => {
                            if let Err(e) = self.ctx.queue.ack(&delivery.receipt).await {
                                tracing::warn!(
                                    job_id = %delivery.task.job_id,
                                    error = %e,
                                    "Failed to acknowledge message"
                                );
                            }
                        }
                        Err(e) => {
                            // Left unacknowledged: the broker redelivers
                            // after the visibility timeout and the guards
                            // resume from persisted state.
                            tracing::error!(
                                job_id = %delivery.task.job_id,
                                stage = %delivery.task.target_stage,
                                error = %e,
                                "Processing error, leaving message for redelivery"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Handle one task. `Err` means an infrastructure failure (store or
    /// queue unreachable): the message is left unacknowledged. Everything
    /// else, including terminal document failures, resolves to an
    /// acknowledged [`Outcome`].
    pub async fn process(&self, task: &TaskMessage) -> Result<Outcome> {
        let stage = self.stage();
        if task.target_stage != stage {
            tracing::warn!(
                job_id = %task.job_id,
                target = %task.target_stage,
                stage = %stage,
                "Task routed to the wrong queue"
            );
            return Ok(Outcome::Skipped);
        }

        let Some(job) = self.ctx.jobs.get(&task.job_id).await? else {
            tracing::warn!(job_id = %task.job_id, "Task references unknown job");
            return Ok(Outcome::Skipped);
        };

        if job.poisoned {
            tracing::debug!(job_id = %job.job_id, "Job poisoned, skipping");
            return Ok(Outcome::Skipped);
        }

        // Idempotence guard: act only while this stage owns the job.
        if job.stage != stage.job_stage() {
            return self.on_foreign_delivery(&job, stage).await;
        }
        if matches!(job.status, JobStatus::Failed | JobStatus::Succeeded) {
            return Ok(Outcome::Skipped);
        }

        match self.ctx.jobs.mark_running(&job.job_id, stage).await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Ok(Outcome::Skipped),
            Err(e) => return Err(e.into()),
        }
        self.ctx.progress.apply(ProgressUpdate::Started(stage)).await;

        // A crashed attempt may have written its artifact before the
        // record transition; resume with it instead of re-running the
        // transformation.
        let result = match self.ctx.artifacts.find(&job.job_id, stage).await? {
            Some(reference) => {
                tracing::debug!(job_id = %job.job_id, stage = %stage, "Resuming from existing artifact");
                Ok(reference)
            }
            None => self.execute(&job, stage).await?,
        };

        match result {
            Ok(reference) => self.commit(&job, stage, reference).await,
            Err(error) if error.is_transient() => self.retry_or_fail(&job, stage, task, error).await,
            Err(error) => self.fail(&job, stage, &error.to_string()).await,
        }
    }

    /// Run the transformation against the prior stage's artifact.
    /// The outer `Result` is infrastructure, the inner one is the
    /// classified stage outcome.
    async fn execute(
        &self,
        job: &Job,
        stage: Stage,
    ) -> Result<std::result::Result<ArtifactRef, StageError>> {
        let input_ref = match stage.prev() {
            None => job.document_ref.clone(),
            Some(prev) => match job.artifact(prev) {
                Some(reference) => reference.clone(),
                None => {
                    // Violates the append-only invariant; nothing to retry.
                    return Ok(Err(StageError::validation(format!(
                        "missing {prev} artifact"
                    ))));
                }
            },
        };

        let Some(input) = self.ctx.artifacts.get(&input_ref).await? else {
            return Ok(Err(StageError::validation(format!(
                "input artifact {input_ref} not found"
            ))));
        };

        match self.executor.execute(job, input).await {
            Ok(output) => {
                let reference = self
                    .ctx
                    .artifacts
                    .put(&job.job_id, stage, output)
                    .await
                    .context("persist stage artifact")?;
                Ok(Ok(reference))
            }
            Err(error) => Ok(Err(error)),
        }
    }

    /// Persisted result → advance the record, hand off, done.
    async fn commit(&self, job: &Job, stage: Stage, reference: ArtifactRef) -> Result<Outcome> {
        let new_stage = stage
            .next()
            .map(Stage::job_stage)
            .unwrap_or(JobStage::Done);

        match self
            .ctx
            .jobs
            .compare_and_advance(&job.job_id, stage.job_stage(), new_stage, Some(reference))
            .await
        {
            Ok(_) => {
                if let Some(next) = stage.next() {
                    let next_task = TaskMessage::new(&job.job_id, next);
                    self.ctx
                        .queue
                        .enqueue(next.queue_name(), &next_task)
                        .await
                        .context("enqueue next stage")?;
                    self.ctx.progress.apply(ProgressUpdate::Queued(next)).await;
                }
                self.ctx.progress.apply(ProgressUpdate::Completed(stage)).await;
                tracing::info!(job_id = %job.job_id, stage = %stage, new_stage = %new_stage, "Stage complete");
                Ok(Outcome::Advanced)
            }
            Err(StoreError::Conflict { .. }) => {
                // A duplicate delivery won the race; its transition stands.
                tracing::debug!(job_id = %job.job_id, stage = %stage, "Lost completion race");
                self.ctx.progress.apply(ProgressUpdate::Completed(stage)).await;
                Ok(Outcome::Skipped)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn retry_or_fail(
        &self,
        job: &Job,
        stage: Stage,
        task: &TaskMessage,
        error: StageError,
    ) -> Result<Outcome> {
        let attempts = match self.ctx.jobs.record_attempt(&job.job_id, stage).await {
            Ok(n) => n,
            Err(StoreError::Conflict { .. }) => return Ok(Outcome::Skipped),
            Err(e) => return Err(e.into()),
        };

        if self.ctx.retry.exhausted(attempts) {
            let message = format!("retry limit reached after {attempts} attempts: {error}");
            return self.fail(job, stage, &message).await;
        }

        let delay = self.ctx.retry.delay_for(attempts);
        let retry_task = task.retry(attempts + 1);
        self.ctx
            .queue
            .enqueue_after(stage.queue_name(), &retry_task, delay)
            .await
            .context("re-enqueue for retry")?;
        self.ctx.progress.apply(ProgressUpdate::Retried(stage)).await;
        tracing::warn!(
            job_id = %job.job_id,
            stage = %stage,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        Ok(Outcome::Retried)
    }

    async fn fail(&self, job: &Job, stage: Stage, error: &str) -> Result<Outcome> {
        match self.ctx.jobs.mark_failed(&job.job_id, stage, error).await {
            Ok(()) => {
                self.ctx.progress.apply(ProgressUpdate::Failed(stage)).await;
                tracing::error!(job_id = %job.job_id, stage = %stage, error = %error, "Job failed");
                Ok(Outcome::Failed)
            }
            Err(StoreError::Conflict { .. }) => Ok(Outcome::Skipped),
            Err(e) => Err(e.into()),
        }
    }

    /// The record has moved past this stage. Usually a plain duplicate,
    /// but if the previous owner crashed between advancing the record and
    /// enqueueing the hand-off, the successor's task never made it out.
    /// Re-enqueueing is safe: duplicates collapse in this same guard.
    async fn on_foreign_delivery(&self, job: &Job, stage: Stage) -> Result<Outcome> {
        if let Some(next) = stage.next() {
            if job.stage == next.job_stage() && job.status == JobStatus::Pending {
                let task = TaskMessage::new(&job.job_id, next);
                self.ctx
                    .queue
                    .enqueue(next.queue_name(), &task)
                    .await
                    .context("re-enqueue successor stage")?;
                tracing::debug!(
                    job_id = %job.job_id,
                    stage = %next,
                    "Re-enqueued successor after possible hand-off gap"
                );
                return Ok(Outcome::Skipped);
            }
        }

        tracing::debug!(
            job_id = %job.job_id,
            stage = %stage,
            job_stage = %job.stage,
            "Duplicate delivery, job already advanced"
        );
        Ok(Outcome::Skipped)
    }
}

/// Spawn a pool of workers for one stage.
pub fn spawn_stage_workers(
    count: usize,
    ctx: WorkerContext,
    executor: Arc<dyn StageExecutor>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|i| {
            let worker = StageWorker::new(ctx.clone(), executor.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::debug!(worker = i, stage = %worker.stage(), "Stage worker started");
                worker.run(cancel).await;
                tracing::debug!(worker = i, stage = %worker.stage(), "Stage worker stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Mutex;

    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::queue::MemoryQueue;
    use crate::store::MemoryJobStore;

    /// Echoes its input with a stage marker appended.
    struct EchoExecutor(Stage);

    #[async_trait]
    impl StageExecutor for EchoExecutor {
        fn stage(&self) -> Stage {
            self.0
        }

        async fn execute(&self, _job: &Job, input: Bytes) -> Result<Bytes, StageError> {
            let mut output = input.to_vec();
            output.extend_from_slice(format!("+{}", self.0).as_bytes());
            Ok(Bytes::from(output))
        }
    }

    /// Fails every call with the given classification.
    struct FailingExecutor {
        stage: Stage,
        transient: bool,
        calls: Mutex<u32>,
    }

    impl FailingExecutor {
        fn new(stage: Stage, transient: bool) -> Self {
            Self {
                stage,
                transient,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl StageExecutor for FailingExecutor {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn execute(&self, _job: &Job, _input: Bytes) -> Result<Bytes, StageError> {
            *self.calls.lock().await += 1;
            if self.transient {
                Err(StageError::transient("service unavailable"))
            } else {
                Err(StageError::validation("corrupt document"))
            }
        }
    }

    /// Panics if invoked: for asserting the resume path skips execution.
    struct UnreachableExecutor(Stage);

    #[async_trait]
    impl StageExecutor for UnreachableExecutor {
        fn stage(&self) -> Stage {
            self.0
        }

        async fn execute(&self, _job: &Job, _input: Bytes) -> Result<Bytes, StageError> {
            panic!("executor must not run when an artifact already exists");
        }
    }

    fn context(max_attempts: u32) -> WorkerContext {
        WorkerContext {
            queue: Arc::new(MemoryQueue::default()),
            jobs: Arc::new(MemoryJobStore::new()),
            artifacts: Arc::new(MemoryArtifactStore::new()),
            retry: RetryConfig {
                max_attempts,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(50),
            },
            progress: ProgressTracker::new(),
        }
    }

    /// Create a job owned by `stage`, with artifacts for all prior stages.
    async fn job_at(ctx: &WorkerContext, stage: Stage) -> Job {
        let upload = ctx
            .artifacts
            .store_upload(Bytes::from_static(b"document body"))
            .await
            .unwrap();
        let job = ctx.jobs.create(upload).await.unwrap();
        let mut position = JobStage::Created;
        let mut advanced = ctx
            .jobs
            .compare_and_advance(&job.job_id, position, JobStage::Ingesting, None)
            .await
            .unwrap();
        position = JobStage::Ingesting;

        while advanced.stage != stage.job_stage() {
            let owner = position.owning_stage().unwrap();
            let reference = ctx
                .artifacts
                .put(&job.job_id, owner, Bytes::from(format!("artifact:{owner}")))
                .await
                .unwrap();
            let next = position.successor().unwrap();
            advanced = ctx
                .jobs
                .compare_and_advance(&job.job_id, position, next, Some(reference))
                .await
                .unwrap();
            position = next;
        }
        advanced
    }

    async fn recv_now(ctx: &WorkerContext, queue: &str) -> Option<TaskMessage> {
        tokio::time::timeout(Duration::from_millis(300), ctx.queue.recv(queue))
            .await
            .ok()
            .and_then(|r| r.ok())
            .map(|d| d.task)
    }

    #[tokio::test]
    async fn success_advances_and_hands_off() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let job = job_at(&ctx, Stage::Ingest).await;

        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Advanced);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Ocr);
        assert_eq!(stored.status, JobStatus::Pending);
        assert!(stored.artifact(Stage::Ingest).is_some());

        let handoff = recv_now(&ctx, "ocr").await.expect("ocr task enqueued");
        assert_eq!(handoff.job_id, job.job_id);
        assert_eq!(handoff.target_stage, Stage::Ocr);
    }

    #[tokio::test]
    async fn terminal_stage_reaches_done() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Vectorize)));
        let job = job_at(&ctx, Stage::Vectorize).await;

        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Vectorize))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Advanced);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Done);
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert_eq!(stored.artifacts.len(), 5);
    }

    #[tokio::test]
    async fn duplicate_delivery_after_advance_is_a_noop() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let job = job_at(&ctx, Stage::Ingest).await;
        let task = TaskMessage::new(&job.job_id, Stage::Ingest);

        assert_eq!(worker.process(&task).await.unwrap(), Outcome::Advanced);
        let after_first = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();

        // Redelivery of the same message: state must not change.
        assert_eq!(worker.process(&task).await.unwrap(), Outcome::Skipped);
        let after_second = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(after_second.stage, after_first.stage);
        assert_eq!(after_second.artifacts, after_first.artifacts);
        assert_eq!(after_second.attempts, after_first.attempts);
    }

    #[tokio::test]
    async fn duplicate_delivery_two_stages_behind_does_not_reenqueue() {
        // The job advanced two stages past ingest; a late ingest duplicate
        // must acknowledge without touching anything.
        let ctx = context(3);
        let job = job_at(&ctx, Stage::Chunk).await;

        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(recv_now(&ctx, "ocr").await.is_none());
        assert_eq!(
            ctx.jobs.get(&job.job_id).await.unwrap().unwrap().stage,
            JobStage::Chunking
        );
    }

    #[tokio::test]
    async fn stale_delivery_repairs_a_lost_handoff() {
        // The record says ocr owns the job (pending) but the ocr queue is
        // empty: the ingest worker crashed between advance and enqueue.
        let ctx = context(3);
        let job = job_at(&ctx, Stage::Ocr).await;

        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);

        let repaired = recv_now(&ctx, "ocr").await.expect("successor re-enqueued");
        assert_eq!(repaired.job_id, job.job_id);
        assert_eq!(repaired.target_stage, Stage::Ocr);
    }

    #[tokio::test]
    async fn transient_failure_requeues_with_backoff() {
        let ctx = context(3);
        let executor = Arc::new(FailingExecutor::new(Stage::Ingest, true));
        let worker = StageWorker::new(ctx.clone(), executor.clone());
        let job = job_at(&ctx, Stage::Ingest).await;

        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Retried);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Ingesting);
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.attempt_count(Stage::Ingest), 1);

        let retry = recv_now(&ctx, "ingest").await.expect("retry enqueued");
        assert_eq!(retry.attempt_number, 2);
    }

    #[tokio::test]
    async fn exhaustion_is_terminal_at_the_configured_limit() {
        let ctx = context(3);
        let executor = Arc::new(FailingExecutor::new(Stage::Embed, true));
        let worker = StageWorker::new(ctx.clone(), executor.clone());
        let job = job_at(&ctx, Stage::Embed).await;

        let mut task = TaskMessage::new(&job.job_id, Stage::Embed);
        assert_eq!(worker.process(&task).await.unwrap(), Outcome::Retried);
        task = recv_now(&ctx, "embeddings").await.unwrap();
        assert_eq!(worker.process(&task).await.unwrap(), Outcome::Retried);
        task = recv_now(&ctx, "embeddings").await.unwrap();
        // Third transient failure hits the limit.
        assert_eq!(worker.process(&task).await.unwrap(), Outcome::Failed);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Failed);
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.attempt_count(Stage::Embed), 3);
        let error = stored.error.unwrap();
        assert!(error.contains("retry limit reached after 3 attempts"), "{error}");

        // Exactly max_attempts executions, and nothing for vectorize.
        assert_eq!(*executor.calls.lock().await, 3);
        assert!(recv_now(&ctx, "embeddings").await.is_none());
        assert!(recv_now(&ctx, "vectors").await.is_none());
    }

    #[tokio::test]
    async fn validation_failure_never_retries() {
        let ctx = context(5);
        let executor = Arc::new(FailingExecutor::new(Stage::Ingest, false));
        let worker = StageWorker::new(ctx.clone(), executor.clone());
        let job = job_at(&ctx, Stage::Ingest).await;

        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Failed);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Failed);
        assert_eq!(stored.error.as_deref(), Some("invalid document: corrupt document"));
        assert_eq!(*executor.calls.lock().await, 1);
        assert!(recv_now(&ctx, "ingest").await.is_none());
    }

    #[tokio::test]
    async fn crashed_attempt_resumes_from_its_artifact() {
        let ctx = context(3);
        let job = job_at(&ctx, Stage::Ocr).await;

        // Simulate a crash after the artifact write but before the record
        // transition.
        let orphan = ctx
            .artifacts
            .put(&job.job_id, Stage::Ocr, Bytes::from_static(b"salvaged text"))
            .await
            .unwrap();

        let worker = StageWorker::new(ctx.clone(), Arc::new(UnreachableExecutor(Stage::Ocr)));
        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ocr))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Advanced);

        let stored = ctx.jobs.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Chunking);
        assert_eq!(stored.artifact(Stage::Ocr), Some(&orphan));
    }

    #[tokio::test]
    async fn poisoned_jobs_are_skipped() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let job = job_at(&ctx, Stage::Ingest).await;
        ctx.jobs.set_poisoned(&job.job_id).await.unwrap();

        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(
            ctx.jobs.get(&job.job_id).await.unwrap().unwrap().stage,
            JobStage::Ingesting
        );
    }

    #[tokio::test]
    async fn unknown_jobs_are_skipped() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let outcome = worker
            .process(&TaskMessage::new("no-such-job", Stage::Ingest))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn misrouted_tasks_are_skipped() {
        let ctx = context(3);
        let worker = StageWorker::new(ctx.clone(), Arc::new(EchoExecutor(Stage::Ingest)));
        let job = job_at(&ctx, Stage::Ingest).await;
        let outcome = worker
            .process(&TaskMessage::new(&job.job_id, Stage::Embed))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }
}
