use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 1_000;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_INDEX_DIR: &str = "faiss_index";

/// A named PDF byte stream supplied for one processing run.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of extracting a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Text(String),
    Unreadable(String),
    Scanned,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub text: String,
    /// Unreadable document names mapped to the parse failure.
    pub unreadable: BTreeMap<String, String>,
    pub scanned: BTreeSet<String>,
}

impl ExtractionReport {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A bounded slice of the extracted text. `start` and `end` are char offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|chunk| chunk.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    pub fn is_not_found(&self) -> bool {
        self.text
            .to_lowercase()
            .contains(crate::synthesizer::NOT_FOUND_SENTINEL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub dataset_version: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub chunk_count: usize,
    pub dataset_version: String,
    pub unreadable: BTreeMap<String, String>,
    pub scanned: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub index_dir: PathBuf,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
        }
    }
}
