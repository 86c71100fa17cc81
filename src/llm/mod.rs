mod ollama;
mod openai;

use async_trait::async_trait;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::puzzle::{decode_puzzle_list, Puzzle, PuzzleError, PuzzleResult, PuzzleSource};

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Request for one completion
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Instructions sent ahead of the prompt
    pub system: String,
    /// The prompt text
    pub prompt: String,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: Option<u32>,
    /// Timeout for the request
    pub timeout: Duration,
    /// Sampling seed, so players sharing a game code get the same output
    pub seed: Option<u64>,
    /// Ask the provider to constrain output to a JSON object
    pub json: bool,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Metadata about the LLM response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openai", "ollama")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Manager for multiple LLM providers
pub struct LlmManager {
    pub providers: Vec<Box<dyn LlmProvider>>,
}

impl LlmManager {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Generate from all providers concurrently.
    /// Successful responses come back in provider order.
    pub async fn generate_from_all(
        &self,
        request: GenerateRequest,
    ) -> Vec<(String, GenerateResponse)> {
        let tasks = self.providers.iter().map(|provider| {
            let req = request.clone();
            let provider_name = provider.name().to_string();
            let provider_ref = provider.as_ref();

            async move {
                match provider_ref.generate(req).await {
                    Ok(response) => Some((provider_name, response)),
                    Err(e) => {
                        tracing::error!("Provider {} failed: {}", provider_name, e);
                        None
                    }
                }
            }
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// OpenAI-compatible endpoint; `None` is api.openai.com
    pub openai_base_url: Option<String>,
    /// Ollama base URL
    pub ollama_base_url: Option<String>,
    /// Ollama model to use
    pub ollama_model: String,
    /// Default timeout for LLM requests
    pub default_timeout: Duration,
    /// Default max tokens for responses
    pub default_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: None,
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ollama_model: "llama3.2".to_string(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 2000,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Unset means the local default; set-but-empty disables Ollama
        let ollama_base_url = match std::env::var("OLLAMA_BASE_URL") {
            Ok(_) => non_empty_env("OLLAMA_BASE_URL"),
            Err(_) => defaults.ollama_base_url,
        };

        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty_env("OPENAI_BASE_URL"),
            ollama_base_url,
            ollama_model: non_empty_env("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            default_timeout: non_empty_env("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            default_max_tokens: non_empty_env("LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_max_tokens),
        }
    }

    /// Build an LlmManager with all configured providers
    pub fn build_manager(&self) -> LlmResult<LlmManager> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();

        if let Some(api_key) = &self.openai_api_key {
            providers.push(Box::new(OpenAiProvider::new(
                api_key.clone(),
                self.openai_model.clone(),
                self.openai_base_url.clone(),
            )));
        }

        if let Some(base_url) = &self.ollama_base_url {
            providers.push(Box::new(OllamaProvider::new(
                base_url.clone(),
                self.ollama_model.clone(),
            )?));
        }

        if providers.is_empty() {
            return Err(LlmError::ConfigError(
                "No LLM providers configured. Set OPENAI_API_KEY or OLLAMA_BASE_URL".to_string(),
            ));
        }

        Ok(LlmManager::new(providers))
    }
}

const PUZZLE_SYSTEM_PROMPT: &str = r#"You write short puzzles for a timed party game.
Answer with a single JSON object of the form {"puzzles": [...]} and nothing else.

Each puzzle is one of:
{"type": "ordering", "title": "...", "steps": ["first", "second", "third", "fourth"]}
{"type": "visual", "question": "...", "options": ["a", "b", "c", "d"], "answer": "a"}

Rules:
- "steps" are listed in the correct order, 3 to 5 of them
- "answer" is exactly one of "options"
- Keep every text short enough to read in a few seconds
- Alternate between the two types"#;

/// Puzzle source backed by the configured LLM providers
pub struct LlmPuzzleSource {
    manager: LlmManager,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmPuzzleSource {
    pub fn new(manager: LlmManager, config: &LlmConfig) -> Self {
        Self {
            manager,
            timeout: config.default_timeout,
            max_tokens: config.default_max_tokens,
        }
    }

    fn request(&self, count: usize, seed: Option<u64>) -> GenerateRequest {
        GenerateRequest {
            system: PUZZLE_SYSTEM_PROMPT.to_string(),
            prompt: format!("Write {} puzzles.", count),
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
            seed,
            json: true,
        }
    }
}

#[async_trait]
impl PuzzleSource for LlmPuzzleSource {
    async fn fetch_puzzles(&self, count: usize, seed: Option<u64>) -> PuzzleResult<Vec<Puzzle>> {
        let responses = self
            .manager
            .generate_from_all(self.request(count, seed))
            .await;

        if responses.is_empty() {
            return Err(PuzzleError::Source(
                "no LLM provider produced a response".to_string(),
            ));
        }

        for (provider, response) in responses {
            match decode_puzzle_list(&response.text) {
                Ok(mut puzzles) => {
                    puzzles.truncate(count);
                    tracing::info!(
                        "Got {} puzzles from {} ({}, {}ms)",
                        puzzles.len(),
                        provider,
                        response.metadata.model,
                        response.metadata.latency_ms
                    );
                    return Ok(puzzles);
                }
                Err(e) => tracing::warn!("Discarding puzzles from {}: {}", provider, e),
            }
        }

        Err(PuzzleError::Source(
            "no LLM provider produced usable puzzles".to_string(),
        ))
    }
}
