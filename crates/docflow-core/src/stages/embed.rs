//! Embed stage: batched vector generation over the chunk list.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use crate::clients::Embedder;
use crate::error::StageError;
use crate::job::{Job, Stage};

use super::{
    decode_artifact, encode_artifact, ChunkList, EmbeddedChunk, EmbeddingArtifact, StageExecutor,
};

/// Keeps single requests to the embedding service bounded.
const MAX_EMBED_BATCH: usize = 256;

pub struct EmbedStage {
    embedder: Arc<dyn Embedder>,
}

impl EmbedStage {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl StageExecutor for EmbedStage {
    fn stage(&self) -> Stage {
        Stage::Embed
    }

    async fn execute(&self, job: &Job, input: Bytes) -> Result<Bytes, StageError> {
        let list: ChunkList = decode_artifact(&input, "chunk list")?;
        if list.chunks.is_empty() {
            return Err(StageError::validation("empty chunk list"));
        }

        let texts: Vec<String> = list.chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }

        if vectors.len() != texts.len() {
            return Err(StageError::transient(format!(
                "embedding service returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(StageError::transient(format!(
                "embedding dimension mismatch: expected {dimensions}, got {}",
                bad.len()
            )));
        }

        let chunks: Vec<EmbeddedChunk> = list
            .chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk {
                index: chunk.index,
                text: chunk.text,
                vector,
            })
            .collect();

        tracing::debug!(job_id = %job.job_id, chunk_count = chunks.len(), "Generated embeddings");
        encode_artifact(
            &EmbeddingArtifact {
                dimensions,
                chunks,
                created_at: Utc::now(),
            },
            "embedding",
        )
    }
}
