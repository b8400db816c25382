//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint implementing `POST /chat/completions`
//! (OpenAI, Azure-style gateways, vLLM, LiteLLM proxies) by overriding
//! `base_url`.

use super::{
    factory::ProviderFactory,
    is_auth_failure, map_send_error, retry_after,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "OpenAI API key",
        ))
    }

    /// Create from `provider_options`: `api_key` (else `OPENAI_API_KEY`) and
    /// optional `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            OPENAI_API_KEY_ENV,
            "OpenAI API key",
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

    /// Set custom base URL (trailing slashes are dropped).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

impl ChatCompletionResponse {
    /// Text of the first choice. A choice without content is an error: the
    /// caller cannot tell "no answer" from "answer with no verdict".
    fn into_completion(self) -> Result<CompletionResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;
        let content = choice.message.content.ok_or(ProviderError::EmptyResponse)?;

        let usage = self
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                ..TokenUsage::default()
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: self.model,
            stop_reason: choice.finish_reason,
        })
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<OpenAiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatCompletionRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
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
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        body.into_completion()
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Factory for [`OpenAiProvider`].
///
/// ```json
/// {
///   "api_key": "sk-...",                    // optional, falls back to OPENAI_API_KEY
///   "base_url": "https://api.openai.com/v1" // optional
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in provider_options or {} env",
                OPENAI_API_KEY_ENV
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
        "OpenAI-compatible chat completions provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("transcript")];
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.0,
            max_tokens: 1024,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "rules"},
                    {"role": "user", "content": "transcript"}
                ],
                "temperature": 0.0,
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn test_response_first_choice() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "model": "gpt-4o-2024-08-06",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "<json>{}</json>"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 900, "completion_tokens": 20, "total_tokens": 920}
            }"#,
        )
        .unwrap();

        let completion = body.into_completion().unwrap();
        assert_eq!(completion.content, "<json>{}</json>");
        assert_eq!(completion.model, "gpt-4o-2024-08-06");
        assert_eq!(completion.usage.total(), 920);
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_response_without_content_is_empty() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"model": "gpt-4o", "choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        )
        .unwrap();
        assert!(matches!(body.into_completion(), Err(ProviderError::EmptyResponse)));

        let body: ChatCompletionResponse =
            serde_json::from_str(r#"{"model": "gpt-4o", "choices": []}"#).unwrap();
        assert!(matches!(body.into_completion(), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"message": "model not found", "type": "invalid_request_error"}}"#),
            "model not found"
        );
        assert_eq!(error_message("  upstream unavailable \n"), "upstream unavailable");
    }

    #[test]
    fn test_from_config() {
        let provider = OpenAiProvider::from_config(&serde_json::json!({
            "api_key": "config-key",
            "base_url": "http://localhost:8000/v1/"
        }))
        .unwrap();

        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
        assert_eq!(provider.credential.expose(), "config-key");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_factory_validation() {
        let factory = OpenAiProviderFactory;
        assert_eq!(factory.provider_type(), "openai");

        let bad_url = serde_json::json!({"api_key": "k", "base_url": "localhost:8000"});
        assert!(factory.validate_config(&bad_url).is_err());

        let ok = serde_json::json!({"api_key": "k"});
        assert!(factory.validate_config(&ok).is_ok());
        assert_eq!(factory.create(&ok).unwrap().name(), "openai");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-openai-super-secret-12345";
        let provider = OpenAiProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(OpenAiProvider::new("key").health_check().await);
        assert!(!OpenAiProvider::new("").health_check().await);
    }
}
