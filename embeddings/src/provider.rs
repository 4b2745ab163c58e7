//! Embedding providers.
//!
//! The [`EmbeddingProvider`] trait is the seam between the index and whatever
//! model turns text into vectors. [`OpenAIProvider`] talks to the OpenAI
//! embeddings API; [`StaticProvider`] serves preset vectors without any
//! network access.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Default timeout for a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,

    /// Dimensions for the output (if supported by provider).
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            dimensions: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
///
/// Implementations are stateless per call: every `embed` is answered by the
/// underlying model, never from a cache.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    ///
    /// Empty or whitespace-only text fails with [`EmbeddingError::EmptyInput`]
    /// without contacting the model.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;
}

fn ensure_non_empty(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,

    /// Output dimensions requested when the request does not set any.
    dimensions: Option<usize>,

    /// Upper bound on a single request.
    timeout: Duration,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Drop any configured API key.
    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Request a reduced output dimension (text-embedding-3 models only).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        if let Some(dims) = self.dimensions {
            return dims;
        }
        match self.default_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        ensure_non_empty(&request.text)?;

        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EmbeddingError::ProviderNotConfigured("OPENAI_API_KEY is not set".to_string())
        })?;

        let model = request.model.unwrap_or_else(|| self.default_model.clone());

        debug!("Generating embedding with model: {model}");

        let mut body = serde_json::json!({
            "input": request.text,
            "model": model
        });

        if let Some(dims) = request.dimensions.or(self.dimensions) {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(EmbeddingError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Embedding request failed with status {status}");
            return Err(EmbeddingError::ApiRequest(format!(
                "status {status}: {error_text}"
            )));
        }

        let bytes = response.bytes().await?;
        let result: OpenAIEmbeddingResponse = serde_json::from_slice(&bytes)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "Empty embedding in response".to_string(),
            ));
        }

        let dimension = embedding.len();
        let tokens_used = result.usage.map(|u| u.total_tokens);

        info!("Generated embedding with {dimension} dimensions");

        Ok(EmbeddingResponse {
            embedding,
            model: result.model,
            dimension,
            tokens_used,
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

/// Provider that answers from a fixed table of text → vector.
///
/// Useful for tests and offline runs. Texts registered with
/// [`StaticProvider::fail_on`] produce an [`EmbeddingError::ApiRequest`].
pub struct StaticProvider {
    vectors: HashMap<String, Embedding>,
    failing: HashSet<String>,
    fallback: Option<Embedding>,
    dimension: usize,
    calls: AtomicUsize,
}

impl StaticProvider {
    /// Create an empty provider for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            failing: HashSet::new(),
            fallback: None,
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Map `text` to `embedding`.
    pub fn with_vector(mut self, text: impl Into<String>, embedding: Embedding) -> Self {
        self.vectors.insert(text.into(), embedding);
        self
    }

    /// Vector returned for any text without an explicit mapping.
    pub fn with_fallback(mut self, embedding: Embedding) -> Self {
        self.fallback = Some(embedding);
        self
    }

    /// Make embedding `text` fail as if the provider errored.
    pub fn fail_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Number of `embed` calls that reached the provider.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn default_model(&self) -> &str {
        "static"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        ensure_non_empty(&request.text)?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&request.text) {
            return Err(EmbeddingError::ApiRequest(format!(
                "simulated failure for {:?}",
                request.text
            )));
        }

        let embedding = self
            .vectors
            .get(&request.text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!(
                    "no vector registered for {:?}",
                    request.text
                ))
            })?;

        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.default_model().to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
    }

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world")
            .with_model("text-embedding-3-small")
            .with_dimensions(512);

        assert_eq!(request.text, "Hello world");
        assert_eq!(request.model, Some("text-embedding-3-small".to_string()));
        assert_eq!(request.dimensions, Some(512));
    }

    #[test]
    fn test_openai_provider_default_dimensions() {
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);

        let provider = provider.with_dimensions(256);
        assert_eq!(provider.default_dimension(), 256);
    }

    #[tokio::test]
    async fn test_openai_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.25, 0.5, 0.75], "index": 0}],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider_for(&server)
            .embed(EmbeddingRequest::new("In the beginning"))
            .await
            .unwrap();

        assert_eq!(response.embedding, vec![0.25, 0.5, 0.75]);
        assert_eq!(response.dimension, 3);
        assert_eq!(response.tokens_used, Some(4));
    }

    #[tokio::test]
    async fn test_openai_rejects_empty_text_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .embed(EmbeddingRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
    }

    #[tokio::test]
    async fn test_openai_missing_key_is_configuration_error() {
        let server = MockServer::start().await;
        let provider = provider_for(&server).without_api_key();

        assert!(!provider.is_available());
        let err = provider
            .embed(EmbeddingRequest::new("text"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_openai_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);

        let err = provider.embed(EmbeddingRequest::new("a")).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unauthorized { status: 401 }));

        let err = provider.embed(EmbeddingRequest::new("a")).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));

        let err = provider.embed(EmbeddingRequest::new("a")).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ApiRequest(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_request_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "data": [{"embedding": [1.0, 0.0], "index": 0}],
                        "model": "text-embedding-3-small"
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .with_timeout(Duration::from_millis(50))
            .embed(EmbeddingRequest::new("slow"))
            .await
            .unwrap_err();
        assert!(matches!(&err, EmbeddingError::Http(inner) if inner.is_timeout()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .embed(EmbeddingRequest::new("text"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticProvider::new(2)
            .with_vector("a", vec![1.0, 0.0])
            .fail_on("broken");

        let response = provider.embed(EmbeddingRequest::new("a")).await.unwrap();
        assert_eq!(response.embedding, vec![1.0, 0.0]);

        assert!(provider.embed(EmbeddingRequest::new("broken")).await.is_err());
        assert!(provider.embed(EmbeddingRequest::new("unknown")).await.is_err());
        assert!(provider.embed(EmbeddingRequest::new("")).await.is_err());

        // Empty input never counts as a provider call.
        assert_eq!(provider.calls(), 3);
    }
}
