pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retriever;
pub mod synthesizer;
pub mod traits;

pub use chunking::{chunk_text, split_text, ChunkingConfig};
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IndexError, IngestError, ServiceError, SessionError};
pub use extractor::{extract_document, extract_documents, LopdfExtractor, PageText, PdfExtractor};
pub use index::{cosine_similarity, IndexStore, IndexedChunk, VectorIndex};
pub use ingest::{discover_pdf_files, load_document, load_documents};
pub use models::{
    Answer, Document, DocumentOutcome, ExtractionReport, IndexManifest, PipelineOptions,
    ProcessReport, RetrievedContext, ScoredChunk, TextChunk,
};
pub use orchestrator::SessionController;
pub use providers::{GeminiChat, GeminiConfig, GeminiEmbeddings};
pub use retriever::Retriever;
pub use synthesizer::{build_prompt, AnswerSynthesizer, NOT_FOUND_SENTINEL};
pub use traits::{EmbeddingService, LanguageModel};
