//! Text cleaning and chunking for the embed stage.
//!
//! Scanned documents arrive with page markers, scanner stamps, and
//! irregular whitespace; those are stripped before the text is split into
//! overlapping chunks sized for the embedding model.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Chunking parameters. Character-based sizing; most embedding services
/// accept ~400 tokens per input, which 1500 characters stays under.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            overlap: 200,
        }
    }
}

/// Boilerplate stripped before chunking: page markers, scanner stamps,
/// print footers.
fn garbage_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?mi)^-{2,}\s*page\s*\d+\s*-{2,}\s*$",
            r"(?mi)^page\s+\d+\s+of\s+\d+.*$",
            r"(?mi)^scanned\s+(with|by)\b.*$",
            r"(?mi)^©?\s*all\s+rights\s+reserved.*$",
            r"(?mi)^printed\s+on\b.*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    })
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("static pattern"))
}

fn blank_line_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"))
}

/// Normalize extracted text: drop boilerplate lines, collapse runs of
/// spaces and blank lines, trim.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text.replace('\r', "");
    for pattern in garbage_patterns() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = whitespace_runs().replace_all(&cleaned, " ");
    let cleaned = blank_line_runs().replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}

/// Splits cleaned text into overlapping chunks.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let splitter = TextSplitter::new(
            ChunkConfig::new(config.max_chars)
                .with_overlap(config.overlap)
                .context("invalid chunk config")?,
        );
        Ok(Self { splitter })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return vec![];
        }
        self.splitter.chunks(text).map(str::to_string).collect()
    }
}
