//! Vectorize stage: upsert into the vector index. Terminal.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use crate::clients::{VectorIndex, VectorPoint};
use crate::error::StageError;
use crate::job::{Job, Stage};

use super::{decode_artifact, encode_artifact, EmbeddingArtifact, StageExecutor, UpsertReceipt};

pub struct VectorizeStage {
    index: Arc<dyn VectorIndex>,
}

impl VectorizeStage {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl StageExecutor for VectorizeStage {
    fn stage(&self) -> Stage {
        Stage::Vectorize
    }

    async fn execute(&self, job: &Job, input: Bytes) -> Result<Bytes, StageError> {
        let artifact: EmbeddingArtifact = decode_artifact(&input, "embedding")?;
        if artifact.chunks.is_empty() {
            return Err(StageError::validation("embedding artifact has no chunks"));
        }

        let points: Vec<VectorPoint> = artifact
            .chunks
            .into_iter()
            .map(|chunk| VectorPoint {
                id: format!("{}_chunk_{}", job.job_id, chunk.index),
                job_id: job.job_id.clone(),
                chunk_index: chunk.index,
                text: chunk.text,
                vector: chunk.vector,
            })
            .collect();

        self.index.upsert(&points).await?;

        tracing::info!(job_id = %job.job_id, indexed = points.len(), "Document indexed");
        encode_artifact(
            &UpsertReceipt {
                indexed: points.len(),
                completed_at: Utc::now(),
            },
            "upsert receipt",
        )
    }
}
