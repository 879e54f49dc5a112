use crate::chunking::{split_text, ChunkingConfig};
use crate::error::SessionError;
use crate::extractor::{extract_documents, LopdfExtractor, PdfExtractor};
use crate::index::{IndexStore, VectorIndex};
use crate::models::{Answer, Document, PipelineOptions, ProcessReport};
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{EmbeddingService, LanguageModel};
use tracing::{info, warn};

/// Drives the two user actions over one shared index directory.
///
/// Both actions take `&mut self`, so a process run and an ask can never
/// overlap on the same controller.
pub struct SessionController<E, L> {
    embedder: E,
    model: L,
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    store: IndexStore,
    chunking: ChunkingConfig,
    top_k: usize,
    temperature: f32,
    pending_question: Option<String>,
}

impl<E, L> SessionController<E, L>
where
    E: EmbeddingService + Send + Sync,
    L: LanguageModel + Send + Sync,
{
    pub fn new(embedder: E, model: L, options: &PipelineOptions) -> Result<Self, crate::IngestError> {
        Ok(Self {
            embedder,
            model,
            extractor: Box::new(LopdfExtractor),
            store: IndexStore::new(options.index_dir.clone()),
            chunking: ChunkingConfig::try_from(options)?,
            top_k: options.top_k.max(1),
            temperature: options.temperature,
            pending_question: None,
        })
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + Send + Sync + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn index_ready(&self) -> bool {
        self.store.exists()
    }

    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    /// Rebuild the index from `documents`, replacing whatever was there.
    pub async fn process(&mut self, documents: &[Document]) -> Result<ProcessReport, SessionError> {
        if documents.is_empty() {
            return Err(SessionError::NoDocumentsProvided);
        }

        self.store.delete().map_err(SessionError::IndexBuild)?;

        let report = extract_documents(self.extractor.as_ref(), documents);
        if !report.has_text() {
            warn!(
                unreadable = report.unreadable.len(),
                scanned = report.scanned.len(),
                "no extractable text in any document"
            );
            return Err(SessionError::NoExtractableText {
                unreadable: report.unreadable,
                scanned: report.scanned,
            });
        }

        let chunks = split_text(&report.text, self.chunking);
        if chunks.is_empty() {
            return Err(SessionError::EmptyChunkResult);
        }

        let index = VectorIndex::build(&chunks, &self.embedder)
            .await
            .map_err(SessionError::IndexBuild)?;
        if let Err(error) = self.store.save(&index) {
            if let Err(cleanup) = self.store.delete() {
                warn!(error = %cleanup, path = %self.store.path().display(), "failed to remove partial index");
            }
            return Err(SessionError::IndexBuild(error));
        }

        let manifest = index.manifest();
        info!(
            documents = documents.len(),
            chunks = manifest.chunk_count,
            model = %manifest.embedding_model,
            dataset_version = %manifest.dataset_version,
            "vector index ready"
        );

        Ok(ProcessReport {
            chunk_count: manifest.chunk_count,
            dataset_version: manifest.dataset_version.clone(),
            unreadable: report.unreadable,
            scanned: report.scanned,
        })
    }

    /// Record a committed question; it stays pending until the next ask.
    pub fn submit_question(&mut self, question: impl Into<String>) {
        self.pending_question = Some(question.into());
    }

    /// Answer the pending question. The question is cleared whatever the outcome.
    pub async fn answer_pending(&mut self) -> Option<Result<Answer, SessionError>> {
        let question = self.pending_question.take()?;
        Some(self.answer(&question).await)
    }

    pub async fn ask(&mut self, question: &str) -> Result<Answer, SessionError> {
        self.submit_question(question);
        match self.answer_pending().await {
            Some(result) => result,
            None => Err(SessionError::EmptyQuestion),
        }
    }

    async fn answer(&self, question: &str) -> Result<Answer, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if !self.store.exists() {
            return Err(SessionError::IndexNotBuilt);
        }

        let context = Retriever::new(&self.store, &self.embedder)
            .retrieve(question, self.top_k)
            .await?;
        let answer = AnswerSynthesizer::new(&self.model, self.temperature)
            .synthesize(&context, question)
            .await?;

        info!(
            context_chunks = context.chunks.len(),
            not_found = answer.is_not_found(),
            "answered question"
        );
        Ok(answer)
    }
}
