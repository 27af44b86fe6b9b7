//! Black-box collaborators: OCR engine, embedding model, vector index.
//!
//! The pipeline treats all three as opaque services behind traits. HTTP
//! implementations live in [`http`]; the mock implementations here back
//! tests and local runs without deployed services.

pub mod http;

pub use http::{HttpEmbedder, HttpOcr, HttpVectorIndex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StageError;

/// Document format accepted by the pipeline, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn sniff(data: &[u8]) -> Option<DocumentKind> {
        if data.starts_with(b"%PDF-") {
            Some(DocumentKind::Pdf)
        } else if data.starts_with(b"PK\x03\x04") {
            // DOCX is a zip container.
            Some(DocumentKind::Docx)
        } else if std::str::from_utf8(data).is_ok() {
            Some(DocumentKind::Text)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "text",
        }
    }
}

/// Black-box text extractor.
///
/// Implementations classify their own failures: I/O and service problems
/// are transient, unreadable documents are validation failures.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, kind: DocumentKind, data: &[u8]) -> Result<String, StageError>;
}

/// Black-box vector generator.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// One vector per input text, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StageError>;
}

/// One chunk ready for vector indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub job_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Black-box upsert/query store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<(), StageError>;
}

/// Passthrough extractor: echoes document bytes as UTF-8 text. Enough for
/// plain-text pipelines and tests; real engines arrive over HTTP.
pub struct MockOcr;

#[async_trait]
impl OcrEngine for MockOcr {
    async fn extract_text(&self, _kind: DocumentKind, data: &[u8]) -> Result<String, StageError> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

/// Returns dummy vectors instead of calling a real model.
pub struct MockEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StageError> {
        Ok(texts.iter().map(|_| vec![0.1; self.dimensions]).collect())
    }
}

/// Collects upserted points in memory for inspection.
#[derive(Default)]
pub struct MockVectorIndex {
    points: Mutex<Vec<VectorPoint>>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn points(&self) -> Vec<VectorPoint> {
        self.points.lock().await.clone()
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<(), StageError> {
        self.points.lock().await.extend_from_slice(points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(DocumentKind::sniff(b"%PDF-1.7 rest"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::sniff(b"PK\x03\x04zipdata"),
            Some(DocumentKind::Docx)
        );
        assert_eq!(
            DocumentKind::sniff("plain text".as_bytes()),
            Some(DocumentKind::Text)
        );
        assert_eq!(DocumentKind::sniff(&[0xff, 0xfe, 0x00, 0x80]), None);
    }

    #[tokio::test]
    async fn mock_embedder_matches_batch_size() {
        let embedder = MockEmbedder { dimensions: 4 };
        let vectors = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 4));
    }
}
