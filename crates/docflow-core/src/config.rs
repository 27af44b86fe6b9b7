//! Worker configuration, supplied through the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::retry::RetryConfig;

/// Upload validation limits for the ingest stage.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub min_text_chars: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            min_text_chars: 1,
        }
    }
}

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/docflow)
    pub data_dir: PathBuf,
    /// Artifact store directory
    pub artifacts_dir: PathBuf,
    pub retry: RetryConfig,
    pub chunking: ChunkingConfig,
    pub limits: UploadLimits,
    /// How long a delivered message stays invisible before redelivery.
    pub visibility_timeout: Duration,
    /// OCR service base URL; without it only plain-text documents extract.
    pub ocr_url: Option<String>,
    /// Embedding service base URL.
    pub embedder_url: Option<String>,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    /// Vector index base URL.
    pub vector_url: Option<String>,
    pub vector_class: String,
}

impl Config {
    /// Load configuration from `DOCFLOW_*` environment variables, with
    /// defaults for everything.
    pub fn load_or_default() -> Self {
        let data_dir = std::env::var("DOCFLOW_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("docflow")
            });

        let retry = RetryConfig {
            max_attempts: env_parse("DOCFLOW_MAX_ATTEMPTS", 5),
            base_delay: Duration::from_millis(env_parse("DOCFLOW_BACKOFF_BASE_MS", 1_000)),
            max_delay: Duration::from_millis(env_parse("DOCFLOW_BACKOFF_CAP_MS", 60_000)),
        };

        let chunking = ChunkingConfig {
            max_chars: env_parse("DOCFLOW_CHUNK_MAX_CHARS", 1_500),
            overlap: env_parse("DOCFLOW_CHUNK_OVERLAP", 200),
        };

        let limits = UploadLimits {
            max_upload_bytes: env_parse::<usize>("DOCFLOW_MAX_UPLOAD_MB", 50) * 1024 * 1024,
            min_text_chars: env_parse("DOCFLOW_MIN_TEXT_CHARS", 1),
        };

        Self {
            artifacts_dir: data_dir.join("artifacts"),
            data_dir,
            retry,
            chunking,
            limits,
            visibility_timeout: Duration::from_millis(env_parse(
                "DOCFLOW_VISIBILITY_TIMEOUT_MS",
                30_000,
            )),
            ocr_url: std::env::var("DOCFLOW_OCR_URL").ok(),
            embedder_url: std::env::var("DOCFLOW_EMBEDDER_URL").ok(),
            embedding_model: std::env::var("DOCFLOW_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "bge-base-en-v1.5".to_string()),
            embedding_dimensions: env_parse("DOCFLOW_EMBEDDING_DIMENSIONS", 768),
            vector_url: std::env::var("DOCFLOW_VECTOR_URL").ok(),
            vector_class: std::env::var("DOCFLOW_VECTOR_CLASS")
                .unwrap_or_else(|_| "Chunk".to_string()),
        }
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.artifacts_dir)?;
        Ok(())
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %value, "Unparseable configuration value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
