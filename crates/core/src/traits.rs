use crate::ServiceError;
use async_trait::async_trait;

/// External embedding service bound to one model identifier.
///
/// The identifier is written into the index manifest so queries can be
/// refused when they would be embedded by a different model.
#[async_trait]
pub trait EmbeddingService {
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
impl<T> EmbeddingService for Box<T>
where
    T: EmbeddingService + Send + Sync + ?Sized,
{
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed_query(text).await
    }
}

#[async_trait]
pub trait LanguageModel {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError>;
}
