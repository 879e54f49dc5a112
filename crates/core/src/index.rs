use crate::error::IndexError;
use crate::models::{IndexManifest, ScoredChunk, TextChunk};
use crate::traits::EmbeddingService;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const INDEX_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Embedded chunks kept in insertion order, searched by cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub async fn build<E>(chunks: &[TextChunk], embedder: &E) -> Result<Self, IndexError>
    where
        E: EmbeddingService + Sync + ?Sized,
    {
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let embeddings = embedder.embed_documents(&texts).await?;

        if embeddings.len() != texts.len() {
            return Err(IndexError::Corrupt(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                texts.len()
            )));
        }

        let entries = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| IndexedChunk { text, embedding })
            .collect::<Vec<_>>();

        Self::from_entries(embedder.model(), entries)
    }

    pub fn from_entries(model: &str, entries: Vec<IndexedChunk>) -> Result<Self, IndexError> {
        let dimensions = entries.first().map(|entry| entry.embedding.len()).unwrap_or(0);
        if let Some(entry) = entries.iter().find(|entry| entry.embedding.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: entry.embedding.len(),
            });
        }

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            dataset_version: dataset_version(model, &entries),
            embedding_model: model.to_string(),
            dimensions,
            chunk_count: entries.len(),
            built_at: Utc::now(),
        };

        Ok(Self { manifest, entries })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if !self.entries.is_empty() && query_vector.len() != self.manifest.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query_vector, &entry.embedding)))
            .collect::<Vec<_>>();

        // stable sort keeps insertion order among equal scores
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                text: self.entries[position].text.clone(),
                score,
                position,
            })
            .collect())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

fn dataset_version(model: &str, entries: &[IndexedChunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    for entry in entries {
        hasher.update((entry.text.len() as u64).to_le_bytes());
        hasher.update(entry.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Handle on the single on-disk index directory.
///
/// Writes are staged in a sibling directory and renamed into place, so a
/// reader never observes a partially written index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.join(MANIFEST_FILE).is_file()
    }

    pub fn delete(&self) -> Result<bool, IndexError> {
        if !self.root.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.root)?;
        info!(path = %self.root.display(), "deleted vector index");
        Ok(true)
    }

    pub fn save(&self, index: &VectorIndex) -> Result<(), IndexError> {
        let staging = self.staging_dir();
        fs::create_dir_all(&staging)?;

        let written = (|| {
            fs::write(
                staging.join(ENTRIES_FILE),
                serde_json::to_vec(&index.entries)?,
            )?;
            fs::write(
                staging.join(MANIFEST_FILE),
                serde_json::to_vec_pretty(&index.manifest)?,
            )?;
            self.delete()?;
            fs::rename(&staging, &self.root)?;
            Ok::<_, IndexError>(())
        })();

        if written.is_err() && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        written?;

        debug!(
            path = %self.root.display(),
            chunks = index.len(),
            dataset_version = %index.manifest.dataset_version,
            "saved vector index"
        );
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<IndexManifest, IndexError> {
        if !self.exists() {
            return Err(IndexError::NotFound(self.root.display().to_string()));
        }
        let manifest: IndexManifest = serde_json::from_slice(&fs::read(self.root.join(MANIFEST_FILE))?)?;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported index format {}",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    pub fn load(&self) -> Result<VectorIndex, IndexError> {
        let manifest = self.read_manifest()?;
        let entries: Vec<IndexedChunk> =
            serde_json::from_slice(&fs::read(self.root.join(ENTRIES_FILE))?)?;

        if entries.len() != manifest.chunk_count {
            return Err(IndexError::Corrupt(format!(
                "manifest lists {} chunks, found {}",
                manifest.chunk_count,
                entries.len()
            )));
        }
        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.embedding.len() != manifest.dimensions)
        {
            return Err(IndexError::DimensionMismatch {
                expected: manifest.dimensions,
                actual: entry.embedding.len(),
            });
        }

        Ok(VectorIndex { manifest, entries })
    }

    fn staging_dir(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "index".to_string());
        let staged = format!(".{name}.staging-{}", Uuid::new_v4());
        match self.root.parent() {
            Some(parent) => parent.join(staged),
            None => PathBuf::from(staged),
        }
    }
}
