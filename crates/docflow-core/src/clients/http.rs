//! HTTP implementations of the collaborator traits.
//!
//! Failure classification happens at this boundary: transport problems
//! and 5xx/429 responses are transient (the retry policy will come back),
//! other error statuses are terminal for the document.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

use super::{DocumentKind, Embedder, OcrEngine, VectorIndex, VectorPoint};

/// OCR and embedding calls can take a while on large documents.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("build HTTP client")
}

fn transport_error(service: &str, error: reqwest::Error) -> StageError {
    StageError::transient(format!("{service} request failed: {error}"))
}

fn status_error(service: &str, status: StatusCode) -> StageError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StageError::transient(format!("{service} returned {status}"))
    } else {
        StageError::validation(format!("{service} rejected the request: {status}"))
    }
}

/// Remote OCR service: `POST {base}/extract?kind=pdf` with the raw
/// document body, returning `{"text": "..."}`.
pub struct HttpOcr {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

impl HttpOcr {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcr {
    async fn extract_text(&self, kind: DocumentKind, data: &[u8]) -> Result<String, StageError> {
        let response = self
            .client
            .post(format!("{}/extract", self.base_url))
            .query(&[("kind", kind.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| transport_error("ocr service", e))?;

        if !response.status().is_success() {
            return Err(status_error("ocr service", response.status()));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| StageError::transient(format!("ocr service response decode: {e}")))?;
        Ok(body.text)
    }
}

/// Remote embedding service: `POST {base}/embeddings` with
/// `{"model": ..., "input": [...]}`, returning `{"vectors": [[...]]}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    vectors: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StageError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("embedding service", e))?;

        if !response.status().is_success() {
            return Err(status_error("embedding service", response.status()));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            StageError::transient(format!("embedding service response decode: {e}"))
        })?;
        Ok(body.vectors)
    }
}

/// Remote vector store: `POST {base}/upsert` with the point batch.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    class: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    class: &'a str,
    points: &'a [VectorPoint],
}

impl HttpVectorIndex {
    pub fn new(base_url: &str, class: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            class: class.to_string(),
        })
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<(), StageError> {
        let request = UpsertRequest {
            class: &self.class,
            points,
        };
        let response = self
            .client
            .post(format!("{}/upsert", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("vector index", e))?;

        if !response.status().is_success() {
            return Err(status_error("vector index", response.status()));
        }
        Ok(())
    }
}
