use crate::traits::{EmbeddingService, LanguageModel};
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The batch endpoint accepts at most this many requests per call.
const MAX_BATCH: usize = 100;

const SERVICE: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    fn method_url(&self, model: &str, method: &str) -> Result<Url, ServiceError> {
        let base = self.endpoint.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/models/{model}:{method}"))?)
    }
}

/// `models/embedding-001` and `embedding-001` name the same model.
fn bare_model(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

fn embed_request(model: &str, text: &str, task_type: &str) -> Value {
    json!({
        "model": format!("models/{model}"),
        "content": { "parts": [{ "text": text }] },
        "taskType": task_type,
    })
}

fn batch_request(model: &str, texts: &[String]) -> Value {
    let requests = texts
        .iter()
        .map(|text| embed_request(model, text, "RETRIEVAL_DOCUMENT"))
        .collect::<Vec<_>>();
    json!({ "requests": requests })
}

fn generate_request(prompt: &str, temperature: f32) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
        "generationConfig": {
            "temperature": temperature,
        },
    })
}

fn classify_failure(status: StatusCode, body: String) -> ServiceError {
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || body.contains("RATE_LIMIT_EXCEEDED")
        || body.contains("RESOURCE_EXHAUSTED");

    if rate_limited {
        ServiceError::RateLimited {
            service: SERVICE.to_string(),
            details: format!("{status}: {body}"),
        }
    } else {
        ServiceError::BackendResponse {
            service: SERVICE.to_string(),
            details: format!("{status}: {body}"),
        }
    }
}

fn candidate_text(response: &Value) -> Result<String, ServiceError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::BackendResponse {
            service: SERVICE.to_string(),
            details: "missing candidates[0].content.parts".to_string(),
        })?;

    Ok(parts
        .iter()
        .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
        .collect::<String>())
}

async fn post_json(client: &Client, config: &GeminiConfig, url: Url, body: &Value) -> Result<Value, ServiceError> {
    if config.api_key.trim().is_empty() {
        return Err(ServiceError::Request("missing api key".to_string()));
    }

    let response = client
        .post(url)
        .header("x-goog-api-key", &config.api_key)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_failure(status, body));
    }

    Ok(response.json().await?)
}

pub struct GeminiEmbeddings {
    client: Client,
    config: GeminiConfig,
    model: String,
}

impl GeminiEmbeddings {
    pub fn new(config: GeminiConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            config,
            model: bare_model(&model).to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let url = self.config.method_url(&self.model, "batchEmbedContents")?;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            debug!(model = %self.model, batch = batch.len(), "gemini batch embedding request");
            let body = batch_request(&self.model, batch);
            let response = post_json(&self.client, &self.config, url.clone(), &body).await?;
            let parsed: BatchEmbedContentsResponse = serde_json::from_value(response)?;

            if parsed.embeddings.len() != batch.len() {
                return Err(ServiceError::BackendResponse {
                    service: SERVICE.to_string(),
                    details: format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        parsed.embeddings.len()
                    ),
                });
            }
            vectors.extend(parsed.embeddings.into_iter().map(|embedding| embedding.values));
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let url = self.config.method_url(&self.model, "embedContent")?;
        let body = embed_request(&self.model, text, "RETRIEVAL_QUERY");
        let response = post_json(&self.client, &self.config, url, &body).await?;
        let parsed: EmbedContentResponse = serde_json::from_value(response)?;
        Ok(parsed.embedding.values)
    }
}

pub struct GeminiChat {
    client: Client,
    config: GeminiConfig,
    model: String,
}

impl GeminiChat {
    pub fn new(config: GeminiConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            config,
            model: bare_model(&model).to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
        let url = self.config.method_url(&self.model, "generateContent")?;
        debug!(model = %self.model, temperature, "gemini generate request");
        let body = generate_request(prompt, temperature);
        let response = post_json(&self.client, &self.config, url, &body).await?;
        candidate_text(&response)
    }
}
