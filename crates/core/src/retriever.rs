use crate::error::{IndexError, SessionError};
use crate::index::IndexStore;
use crate::models::RetrievedContext;
use crate::traits::EmbeddingService;
use tracing::debug;

/// Nearest-neighbour lookup against a freshly loaded copy of the index.
pub struct Retriever<'a, E: ?Sized> {
    store: &'a IndexStore,
    embedder: &'a E,
}

impl<'a, E> Retriever<'a, E>
where
    E: EmbeddingService + Sync + ?Sized,
{
    pub fn new(store: &'a IndexStore, embedder: &'a E) -> Self {
        Self { store, embedder }
    }

    pub async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievedContext, SessionError> {
        let index = match self.store.load() {
            Ok(index) => index,
            Err(IndexError::NotFound(_)) => return Err(SessionError::IndexNotBuilt),
            Err(error) => return Err(SessionError::Index(error)),
        };

        let indexed_model = &index.manifest().embedding_model;
        if indexed_model != self.embedder.model() {
            return Err(SessionError::Index(IndexError::ModelMismatch {
                indexed: indexed_model.clone(),
                configured: self.embedder.model().to_string(),
            }));
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let chunks = index.search(&query_vector, k).map_err(SessionError::Index)?;

        debug!(
            k,
            hits = chunks.len(),
            dataset_version = %index.manifest().dataset_version,
            "retrieved context"
        );
        Ok(RetrievedContext { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::{IndexedChunk, VectorIndex};
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_index_is_index_not_built() {
        let dir = tempdir().expect("tempdir");
        let store = IndexStore::new(dir.path().join("faiss_index"));
        let embedder = CharacterNgramEmbedder::default();

        let result = Retriever::new(&store, &embedder).retrieve("anything", 5).await;
        assert!(matches!(result, Err(SessionError::IndexNotBuilt)));
    }

    #[tokio::test]
    async fn returns_top_k_by_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("faiss_index"));
        let embedder = CharacterNgramEmbedder::default();
        let texts = [
            "The sky is blue.",
            "Grass is green in spring.",
            "Hydraulic pumps need regular maintenance.",
        ];
        let entries = texts
            .iter()
            .map(|text| IndexedChunk {
                text: text.to_string(),
                embedding: embedder.embed(text),
            })
            .collect();
        store.save(&VectorIndex::from_entries(embedder.model(), entries)?)?;

        let context = Retriever::new(&store, &embedder)
            .retrieve("What color is the sky?", 2)
            .await?;

        assert_eq!(context.chunks.len(), 2);
        assert_eq!(context.chunks[0].text, "The sky is blue.");
        Ok(())
    }

    #[tokio::test]
    async fn model_mismatch_is_refused() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = IndexStore::new(dir.path().join("faiss_index"));
        let builder = CharacterNgramEmbedder::new(16);
        let entries = vec![IndexedChunk {
            text: "text".to_string(),
            embedding: builder.embed("text"),
        }];
        store.save(&VectorIndex::from_entries(builder.model(), entries)?)?;

        let other = CharacterNgramEmbedder::new(32);
        let result = Retriever::new(&store, &other).retrieve("text", 1).await;
        assert!(matches!(
            result,
            Err(SessionError::Index(IndexError::ModelMismatch { .. }))
        ));
        Ok(())
    }
}
