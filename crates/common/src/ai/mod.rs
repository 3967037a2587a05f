//! AI provider abstraction
//!
//! A single trait covers the two upstream calls the platform makes: chat
//! completions and text embeddings. `HttpAiProvider` speaks the
//! OpenAI-compatible wire format against a configurable base URL, so
//! tenants can point it at OpenAI, Azure, or a local gateway through
//! their AI settings. `MockAiProvider` is deterministic and is used in
//! tests and for the `mock` provider id.
//!
//! Upstream failures are surfaced with the provider's status and body
//! intact; nothing in this module retries.

use crate::config::AiConfig;
use crate::db::models::AiSettings;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use text_splitter::{ChunkConfig, TextSplitter};

/// Default public OpenAI endpoint
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Upstream cap on inputs per embedding request
const EMBED_BATCH_SIZE: usize = 100;

/// One turn of a chat exchange, in the OpenAI message shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for AI providers
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Run a chat completion and return the assistant reply
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Embed texts, preserving input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Chat model identifier
    fn chat_model(&self) -> &str;

    /// Embedding model identifier
    fn embedding_model(&self) -> &str;

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}

/// Resolved connection settings for an HTTP provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Resolve from process-level config; `None` when no key is set
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            api_key,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Resolve from per-tenant settings; the caller decrypts the key first
    pub fn from_tenant(settings: &AiSettings, api_key: String, timeout: Duration) -> Self {
        Self {
            api_key,
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            timeout,
        }
    }
}

/// OpenAI-compatible HTTP provider
pub struct HttpAiProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            dimension: embedding_dimension(&settings.embedding_model),
            api_base: settings.api_base,
            api_key: settings.api_key,
            chat_model: settings.chat_model,
            embedding_model: settings.embedding_model,
        })
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::AiProvider {
                message: format!("Request to {} failed: {}", path, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AiProvider {
                message: format!("API error {}: {}", status, body),
            });
        }

        Ok(response)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response = self.post_json("embeddings", &request).await?;

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| AppError::AiProvider {
                message: format!("Failed to parse embedding response: {}", e),
            })?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::AiProvider {
                message: format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
        };

        let response = self.post_json("chat/completions", &request).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::AiProvider {
            message: format!("Failed to parse chat response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::AiProvider {
                message: "Chat response contained no choices".to_string(),
            })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }

    fn chat_model(&self) -> &str {
        &self.chat_model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic provider for tests and offline development
pub struct MockAiProvider {
    dimension: usize,
}

impl MockAiProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new(crate::DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("Mock response to: {}", last))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| deterministic_vector(text, self.dimension))
            .collect())
    }

    fn chat_model(&self) -> &str {
        "mock-chat"
    }

    fn embedding_model(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Unit-length vector derived from the text; identical inputs always embed
/// identically, so similarity ordering is stable across test runs.
fn deterministic_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(dimension);
    let mut counter: u32 = 0;

    while values.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_be_bytes());
        for byte in hasher.finalize() {
            if values.len() == dimension {
                break;
            }
            values.push(byte as f32 / 255.0 - 0.5);
        }
        counter += 1;
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }

    values
}

/// Known embedding model dimensions; unknown models get the default
fn embedding_dimension(model: &str) -> usize {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        _ => crate::DEFAULT_EMBEDDING_DIMENSION,
    }
}

/// Build a provider from resolved settings, honoring the `mock` id
pub fn build_provider(provider_id: &str, settings: ProviderSettings) -> Result<Arc<dyn AiProvider>> {
    match provider_id {
        "mock" => Ok(Arc::new(MockAiProvider::new(embedding_dimension(
            &settings.embedding_model,
        )))),
        _ => Ok(Arc::new(HttpAiProvider::new(settings)?)),
    }
}

/// Build the platform-wide fallback provider from process config.
/// Returns `None` when no key is configured and the provider is not `mock`;
/// tenant-level settings can still supply one per request.
pub fn provider_from_config(config: &AiConfig) -> Option<Arc<dyn AiProvider>> {
    if config.provider == "mock" {
        return Some(Arc::new(MockAiProvider::new(config.embedding_dimension)));
    }

    let settings = ProviderSettings::from_config(config)?;
    match HttpAiProvider::new(settings) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build AI provider from config");
            None
        }
    }
}

/// Split document text into chunks sized for embedding.
/// Overlap keeps context that straddles a boundary retrievable from
/// either side.
pub fn chunk_text(content: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let config = ChunkConfig::new(max_chars)
        .with_overlap(overlap)
        .unwrap_or_else(|_| ChunkConfig::new(max_chars));

    TextSplitter::new(config)
        .chunks(content)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_echoes_last_user_turn() {
        let provider = MockAiProvider::new(8);
        let messages = vec![
            ChatMessage::system("You are a compliance assistant"),
            ChatMessage::user("What is GDPR Article 30?"),
        ];

        let reply = provider.chat(&messages).await.unwrap();
        assert!(reply.contains("GDPR Article 30"));
    }

    #[tokio::test]
    async fn test_mock_embed_dimension_and_order() {
        let provider = MockAiProvider::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string()];

        let embeddings = provider.embed(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 16);
        assert_eq!(embeddings[1].len(), 16);
        assert_ne!(embeddings[0], embeddings[1]);
    }

    #[tokio::test]
    async fn test_mock_embed_is_deterministic() {
        let provider = MockAiProvider::new(32);
        let texts = vec!["data retention policy".to_string()];

        let first = provider.embed(&texts).await.unwrap();
        let second = provider.embed(&texts).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deterministic_vector_is_unit_length() {
        let vector = deterministic_vector("incident response", 64);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_dimensions_by_model() {
        assert_eq!(embedding_dimension("text-embedding-ada-002"), 1536);
        assert_eq!(embedding_dimension("text-embedding-3-large"), 3072);
        assert_eq!(embedding_dimension("some-local-model"), 1536);
    }

    #[test]
    fn test_provider_settings_require_api_key() {
        let config = AiConfig::default();
        assert!(ProviderSettings::from_config(&config).is_none());

        let mut with_key = AiConfig::default();
        with_key.api_key = Some("sk-test".to_string());
        let settings = ProviderSettings::from_config(&with_key).unwrap();
        assert_eq!(settings.api_base, OPENAI_API_BASE);
        assert_eq!(settings.chat_model, crate::DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_mock_provider_id_skips_http_client() {
        let mut config = AiConfig::default();
        config.provider = "mock".to_string();
        assert!(provider_from_config(&config).is_some());

        // openai without a key cannot be built
        config.provider = "openai".to_string();
        assert!(provider_from_config(&config).is_none());
    }

    #[test]
    fn test_chunk_text_splits_long_content() {
        let paragraph = "Access reviews run quarterly. ".repeat(100);
        let chunks = chunk_text(&paragraph, 500, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 500);
        }
    }

    #[test]
    fn test_chunk_text_short_content_is_single_chunk() {
        let chunks = chunk_text("One short policy line.", 500, 50);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_chunk_text_empty_content() {
        let chunks = chunk_text("", 500, 50);
        assert!(chunks.is_empty());
    }
}
