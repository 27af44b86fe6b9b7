//! Ingest stage: upload validation and the raw artifact.

use async_trait::async_trait;
use bytes::Bytes;

use crate::clients::DocumentKind;
use crate::config::UploadLimits;
use crate::error::StageError;
use crate::job::{Job, Stage};

use super::StageExecutor;

/// Validates the upload and records it as the `ingest` artifact. Rejected
/// documents never reach the OCR stage.
pub struct IngestStage {
    max_upload_bytes: usize,
    min_text_chars: usize,
}

impl IngestStage {
    pub fn new(limits: &UploadLimits) -> Self {
        Self {
            max_upload_bytes: limits.max_upload_bytes,
            min_text_chars: limits.min_text_chars,
        }
    }
}

#[async_trait]
impl StageExecutor for IngestStage {
    fn stage(&self) -> Stage {
        Stage::Ingest
    }

    async fn execute(&self, _job: &Job, input: Bytes) -> Result<Bytes, StageError> {
        if input.is_empty() {
            return Err(StageError::validation("empty upload"));
        }
        if input.len() > self.max_upload_bytes {
            return Err(StageError::validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                input.len(),
                self.max_upload_bytes
            )));
        }

        let kind = DocumentKind::sniff(&input)
            .ok_or_else(|| StageError::validation("unsupported document format"))?;

        // Length of plain text can be checked now; scanned formats are
        // checked after extraction.
        if kind == DocumentKind::Text {
            let text = std::str::from_utf8(&input)
                .map_err(|e| StageError::validation(format!("invalid UTF-8 upload: {e}")))?;
            if text.trim().chars().count() < self.min_text_chars {
                return Err(StageError::validation("document below minimum length"));
            }
        }

        Ok(input)
    }
}
