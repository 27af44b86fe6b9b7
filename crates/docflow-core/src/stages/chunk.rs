//! Chunk stage: cleaning and splitting extracted text.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::chunker::{clean_text, Chunker, ChunkingConfig};
use crate::error::StageError;
use crate::job::{Job, Stage};

use super::{encode_artifact, ChunkList, ChunkRecord, StageExecutor};

/// Splits the OCR text into overlapping chunks sized for embedding.
pub struct ChunkStage {
    chunker: Chunker,
}

impl ChunkStage {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunker: Chunker::new(config)?,
        })
    }
}

#[async_trait]
impl StageExecutor for ChunkStage {
    fn stage(&self) -> Stage {
        Stage::Chunk
    }

    async fn execute(&self, job: &Job, input: Bytes) -> Result<Bytes, StageError> {
        let text = std::str::from_utf8(&input)
            .map_err(|e| StageError::validation(format!("invalid UTF-8 text artifact: {e}")))?;

        let cleaned = clean_text(text);
        let chunks: Vec<ChunkRecord> = self
            .chunker
            .chunk(&cleaned)
            .into_iter()
            .enumerate()
            .map(|(index, text)| ChunkRecord { index, text })
            .collect();

        if chunks.is_empty() {
            return Err(StageError::validation("document produced no chunks"));
        }

        tracing::debug!(job_id = %job.job_id, chunk_count = chunks.len(), "Chunked document");
        encode_artifact(&ChunkList { chunks }, "chunk list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactRef;
    use crate::stages::decode_artifact;

    fn stage() -> ChunkStage {
        ChunkStage::new(&ChunkingConfig {
            max_chars: 40,
            overlap: 5,
        })
        .unwrap()
    }

    fn job() -> Job {
        Job::new(ArtifactRef::new("blake3:upload"))
    }

    #[tokio::test]
    async fn splits_long_text_into_indexed_chunks() {
        let text = "First sentence here. Second sentence follows. Third sentence comes after.";
        let output = stage().execute(&job(), Bytes::from(text)).await.unwrap();

        let list: ChunkList = decode_artifact(&output, "chunk list").unwrap();
        assert!(list.chunks.len() > 1);
        for (i, chunk) in list.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.text.chars().count() <= 40);
        }
    }

    #[tokio::test]
    async fn blank_text_is_terminal() {
        let result = stage().execute(&job(), Bytes::from_static(b"  \n\n ")).await;
        assert!(matches!(result, Err(StageError::Validation(_))));
    }

    #[tokio::test]
    async fn non_utf8_input_is_terminal() {
        let result = stage()
            .execute(&job(), Bytes::from_static(&[0xff, 0xfe, 0x80]))
            .await;
        assert!(matches!(result, Err(StageError::Validation(_))));
    }
}
