//! Stage transformations.
//!
//! Each stage consumes the prior stage's artifact bytes and produces its
//! own. The worker owns everything around the transformation: loading
//! input, persisting output, advancing the job record, hand-off.

mod chunk;
mod embed;
mod ingest;
mod ocr;
mod vectorize;

pub use chunk::ChunkStage;
pub use embed::EmbedStage;
pub use ingest::IngestStage;
pub use ocr::OcrStage;
pub use vectorize::VectorizeStage;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::job::{Job, Stage};

/// One pipeline stage's transformation.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn stage(&self) -> Stage;

    /// Transform the prior stage's artifact (or the original upload for
    /// ingest) into this stage's artifact.
    async fn execute(&self, job: &Job, input: Bytes) -> Result<Bytes, StageError>;
}

/// Artifact written by the chunk stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkList {
    pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: usize,
    pub text: String,
}

/// Artifact written by the embed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingArtifact {
    pub dimensions: usize,
    pub chunks: Vec<EmbeddedChunk>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Artifact written by the terminal vectorize stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertReceipt {
    pub indexed: usize,
    pub completed_at: DateTime<Utc>,
}

pub(crate) fn decode_artifact<T: DeserializeOwned>(
    input: &[u8],
    what: &str,
) -> Result<T, StageError> {
    serde_json::from_slice(input)
        .map_err(|e| StageError::validation(format!("corrupt {what} artifact: {e}")))
}

pub(crate) fn encode_artifact<T: Serialize>(value: &T, what: &str) -> Result<Bytes, StageError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| StageError::validation(format!("encode {what} artifact: {e}")))
}
