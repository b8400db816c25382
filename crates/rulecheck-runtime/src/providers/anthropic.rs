//! Anthropic Messages API provider.
//!
//! The system turn is lifted into the top-level `system` field; the rest
//! are sent as text content blocks, optionally marked for prompt caching.
//! The rule corpus makes the system prompt large and stable across a batch,
//! which is where caching pays off.
//!
//! ## Security
//!
//! This provider uses the centralized [`ApiCredential`] system for secure
//! credential handling. See the [`secrets`](super::secrets) module for details.

use super::{
    factory::ProviderFactory,
    is_auth_failure, map_send_error, retry_after,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, ChatRole, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
///
/// # Security
///
/// The API key is stored using [`ApiCredential`], so it cannot be printed
/// through `Debug` or `Display` and must be exposed explicitly with
/// `.expose()` when the request header is built.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key (will be stored securely)
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Create from JSON configuration with environment fallback.
    ///
    /// 1. Checks for `api_key` in the config
    /// 2. Falls back to `ANTHROPIC_API_KEY` environment variable
    /// 3. Returns error if neither is set
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let mut provider = Self::with_credential(credential);
        if let Some(url) = config["base_url"].as_str() {
            provider = provider.with_base_url(url);
        }
        Ok(provider)
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<ContentBlock>>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    type_: &'static str,
}

impl ContentBlock {
    fn text(text: String, cached: bool) -> Self {
        ContentBlock::Text {
            text,
            cache_control: cached.then_some(CacheControl {
                type_: "ephemeral",
            }),
        }
    }
}

impl AnthropicRequest {
    /// Build a request. System turns are joined into the `system` field;
    /// only the system prompt is marked cacheable since the transcript
    /// changes on every call.
    fn build(messages: Vec<ChatMessage>, config: &CompletionConfig) -> Self {
        let mut system_parts = Vec::new();
        let mut turns = Vec::new();

        for msg in messages {
            match msg.role {
                ChatRole::System => system_parts.push(msg.content),
                role => turns.push(AnthropicMessage {
                    role: role.as_str(),
                    content: vec![ContentBlock::text(msg.content, false)],
                }),
            }
        }

        let system = (!system_parts.is_empty())
            .then(|| vec![ContentBlock::text(system_parts.join("\n\n"), config.prompt_caching)]);

        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages: turns,
            temperature: config.temperature,
        }
    }
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicResponse {
    fn into_completion(self) -> Result<CompletionResponse, ProviderError> {
        let texts: Vec<String> = self
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        if texts.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(CompletionResponse {
            content: texts.concat(),
            usage: TokenUsage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
                cache_read_tokens: self.usage.cache_read_input_tokens,
                cache_creation_tokens: self.usage.cache_creation_input_tokens,
            },
            model: self.model,
            stop_reason: self.stop_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = AnthropicRequest::build(messages, config);

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, config.timeout))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        if is_auth_failure(status) {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::HttpError(e.to_string()))?;
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.trim().to_string());

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        body.into_completion()
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for creating Anthropic providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-ant-...",   // Optional, falls back to ANTHROPIC_API_KEY env
///   "base_url": "https://..."  // Optional, custom API endpoint
/// }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in provider_options or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude provider with prompt caching support"
    }
}
