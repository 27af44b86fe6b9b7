//! OCR stage: black-box text extraction plus light normalization.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::chunker::clean_text;
use crate::clients::{DocumentKind, OcrEngine};
use crate::error::StageError;
use crate::job::{Job, Stage};

use super::StageExecutor;

/// Extracts text from the raw upload. Plain-text documents bypass the
/// engine; PDFs and DOCX go through it.
pub struct OcrStage {
    engine: Arc<dyn OcrEngine>,
}

impl OcrStage {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StageExecutor for OcrStage {
    fn stage(&self) -> Stage {
        Stage::Ocr
    }

    async fn execute(&self, job: &Job, input: Bytes) -> Result<Bytes, StageError> {
        let kind = DocumentKind::sniff(&input)
            .ok_or_else(|| StageError::validation("unsupported document format"))?;

        let raw = match kind {
            DocumentKind::Text => String::from_utf8(input.to_vec())
                .map_err(|e| StageError::validation(format!("invalid UTF-8 document: {e}")))?,
            DocumentKind::Pdf | DocumentKind::Docx => {
                self.engine.extract_text(kind, &input).await?
            }
        };

        let text = clean_text(&raw);
        if text.is_empty() {
            return Err(StageError::validation("no text extracted from document"));
        }

        tracing::debug!(
            job_id = %job.job_id,
            kind = kind.as_str(),
            chars = text.chars().count(),
            "Extracted text"
        );
        Ok(Bytes::from(text))
    }
}
