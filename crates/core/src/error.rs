use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures reported by the embedding or language-model services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rate limit exceeded by {service}: {details}")]
    RateLimited { service: String, details: String },

    #[error("invalid response from {service}: {details}")]
    BackendResponse { service: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("service request failed: {0}")]
    Request(String),
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no vector index found at {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with embedding model {indexed}, but {configured} is configured")]
    ModelMismatch { indexed: String, configured: String },

    #[error("embedding service error: {0}")]
    Embedding(#[from] ServiceError),
}

/// Errors surfaced at the boundary of the `process` and `ask` actions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no documents provided")]
    NoDocumentsProvided,

    #[error(
        "no extractable text (unreadable: {}, scanned: {})",
        join_unreadable(.unreadable),
        join_names(.scanned)
    )]
    NoExtractableText {
        unreadable: BTreeMap<String, String>,
        scanned: BTreeSet<String>,
    },

    #[error("no text chunks generated")]
    EmptyChunkResult,

    #[error("index build failed: {0}")]
    IndexBuild(#[source] IndexError),

    #[error("vector index has not been built")]
    IndexNotBuilt,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("index error: {0}")]
    Index(#[source] IndexError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

impl SessionError {
    /// Message shown to the person driving the session.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Index(IndexError::Embedding(error))
            | SessionError::IndexBuild(IndexError::Embedding(error))
            | SessionError::Service(error)
                if error.is_rate_limited() =>
            {
                "Our system is receiving too many requests at the moment. Please wait a minute and try again."
                    .to_string()
            }
            SessionError::NoDocumentsProvided => {
                "Please upload at least one PDF file to process.".to_string()
            }
            SessionError::NoExtractableText { .. } => {
                "None of the uploaded PDFs contained extractable text.".to_string()
            }
            SessionError::EmptyChunkResult => {
                "No text chunks generated. Please check the PDF content.".to_string()
            }
            SessionError::IndexBuild(error) => format!("Error during processing: {error}"),
            SessionError::IndexNotBuilt => {
                "Please upload and process PDFs first before asking questions.".to_string()
            }
            SessionError::EmptyQuestion => "Please enter a question.".to_string(),
            SessionError::Index(error) => format!("Error processing your question: {error}"),
            SessionError::Service(error) => format!("Error processing your question: {error}"),
        }
    }
}

fn join_names(names: &BTreeSet<String>) -> String {
    join(names.iter())
}

fn join_unreadable(unreadable: &BTreeMap<String, String>) -> String {
    join(unreadable.keys())
}

fn join<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let joined = names.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_gets_retry_later_message() {
        let error = SessionError::Service(ServiceError::RateLimited {
            service: "gemini".to_string(),
            details: "RATE_LIMIT_EXCEEDED".to_string(),
        });
        assert!(error.user_message().contains("wait a minute"));

        let nested = SessionError::Index(IndexError::Embedding(ServiceError::RateLimited {
            service: "gemini".to_string(),
            details: "429".to_string(),
        }));
        assert!(nested.user_message().contains("wait a minute"));
    }

    #[test]
    fn rate_limited_embedding_during_build_gets_retry_later_message() {
        let error = SessionError::IndexBuild(IndexError::Embedding(ServiceError::RateLimited {
            service: "gemini".to_string(),
            details: "429 Too Many Requests: RESOURCE_EXHAUSTED".to_string(),
        }));
        assert!(error.user_message().contains("wait a minute"));

        let other = SessionError::IndexBuild(IndexError::Embedding(ServiceError::Request(
            "connection reset".to_string(),
        )));
        assert_eq!(
            other.user_message(),
            "Error during processing: embedding service error: service request failed: connection reset"
        );
    }

    #[test]
    fn other_service_errors_show_raw_description() {
        let error = SessionError::Service(ServiceError::Request("boom".to_string()));
        assert_eq!(
            error.user_message(),
            "Error processing your question: service request failed: boom"
        );
    }

    #[test]
    fn missing_index_is_actionable() {
        let message = SessionError::IndexNotBuilt.user_message();
        assert!(message.contains("process PDFs first"));
    }

    #[test]
    fn no_text_lists_names() {
        let error = SessionError::NoExtractableText {
            unreadable: BTreeMap::from([("a.pdf".to_string(), "pdf parse error: eof".to_string())]),
            scanned: BTreeSet::new(),
        };
        assert_eq!(
            error.to_string(),
            "no extractable text (unreadable: a.pdf, scanned: none)"
        );
    }
}
