//! Artifact storage for intermediate pipeline outputs.
//!
//! Artifacts are content-addressed blobs plus a `(job, stage)` index so a
//! redelivered task can detect output left behind by a crashed attempt.
//! References are opaque strings; stages never assume a storage backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::job::Stage;

/// Opaque reference to a stored artifact, resolvable only by the store
/// that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an original upload, before any job record exists.
    async fn store_upload(&self, data: Bytes) -> Result<ArtifactRef>;

    /// Store a stage output and record it under `(job, stage)`.
    async fn put(&self, job_id: &str, stage: Stage, data: Bytes) -> Result<ArtifactRef>;

    /// Resolve a reference to its bytes.
    async fn get(&self, reference: &ArtifactRef) -> Result<Option<Bytes>>;

    /// Presence probe for recovery: the artifact a crashed attempt may
    /// have written before the job record was updated.
    async fn find(&self, job_id: &str, stage: Stage) -> Result<Option<ArtifactRef>>;
}

fn content_ref(data: &[u8]) -> ArtifactRef {
    ArtifactRef::new(format!("blake3:{}", blake3::hash(data).to_hex()))
}

fn blob_name(reference: &ArtifactRef) -> Result<&str> {
    match reference.as_str().strip_prefix("blake3:") {
        Some(hex) => Ok(hex),
        None => bail!("unknown artifact reference scheme: {}", reference),
    }
}

/// In-memory store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryArtifactStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    blobs: HashMap<String, Bytes>,
    index: HashMap<(String, Stage), ArtifactRef>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store_upload(&self, data: Bytes) -> Result<ArtifactRef> {
        let reference = content_ref(&data);
        let mut inner = self.inner.write().await;
        inner.blobs.insert(blob_name(&reference)?.to_string(), data);
        Ok(reference)
    }

    async fn put(&self, job_id: &str, stage: Stage, data: Bytes) -> Result<ArtifactRef> {
        let reference = content_ref(&data);
        let mut inner = self.inner.write().await;
        inner.blobs.insert(blob_name(&reference)?.to_string(), data);
        inner
            .index
            .insert((job_id.to_string(), stage), reference.clone());
        Ok(reference)
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Option<Bytes>> {
        let inner = self.inner.read().await;
        Ok(inner.blobs.get(blob_name(reference)?).cloned())
    }

    async fn find(&self, job_id: &str, stage: Stage) -> Result<Option<ArtifactRef>> {
        let inner = self.inner.read().await;
        Ok(inner.index.get(&(job_id.to_string(), stage)).cloned())
    }
}

/// Filesystem store: content-addressed blobs under `blobs/`, plus one
/// `.ref` file per `(job, stage)` under `jobs/`.
pub struct FsArtifactStore {
    blobs_dir: PathBuf,
    jobs_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn open(root: &Path) -> Result<Self> {
        let blobs_dir = root.join("blobs");
        let jobs_dir = root.join("jobs");
        std::fs::create_dir_all(&blobs_dir).context("create artifact blobs directory")?;
        std::fs::create_dir_all(&jobs_dir).context("create artifact jobs directory")?;
        Ok(Self {
            blobs_dir,
            jobs_dir,
        })
    }

    fn blob_path(&self, hex: &str) -> PathBuf {
        self.blobs_dir.join(hex)
    }

    fn ref_path(&self, job_id: &str, stage: Stage) -> PathBuf {
        self.jobs_dir.join(job_id).join(format!("{stage}.ref"))
    }

    async fn write_blob(&self, reference: &ArtifactRef, data: &[u8]) -> Result<()> {
        let path = self.blob_path(blob_name(reference)?);
        if tokio::fs::try_exists(&path).await? {
            // Content-addressed: an existing blob is the same bytes.
            return Ok(());
        }
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("write artifact blob {}", reference))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("commit artifact blob {}", reference))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store_upload(&self, data: Bytes) -> Result<ArtifactRef> {
        let reference = content_ref(&data);
        self.write_blob(&reference, &data).await?;
        Ok(reference)
    }

    async fn put(&self, job_id: &str, stage: Stage, data: Bytes) -> Result<ArtifactRef> {
        let reference = content_ref(&data);
        self.write_blob(&reference, &data).await?;

        // The ref file is written after the blob it points to, so a
        // present ref always resolves.
        let ref_path = self.ref_path(job_id, stage);
        if let Some(parent) = ref_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&ref_path, reference.as_str())
            .await
            .with_context(|| format!("record artifact for job {job_id} stage {stage}"))?;
        Ok(reference)
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Option<Bytes>> {
        let path = self.blob_path(blob_name(reference)?);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read artifact blob {}", reference)),
        }
    }

    async fn find(&self, job_id: &str, stage: Stage) -> Result<Option<ArtifactRef>> {
        match tokio::fs::read_to_string(self.ref_path(job_id, stage)).await {
            Ok(contents) => Ok(Some(ArtifactRef::new(contents.trim()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read artifact ref for job {job_id}")),
        }
    }
}
