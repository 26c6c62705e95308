//! OpenAI-compatible chat-completion provider.
//!
//! Sends one `POST {base_url}/chat/completions` per call with the prompt as a
//! single user message, and returns the first choice's message content.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{LlmProvider, validate_request};
use crate::error::{Error, ProviderError, Result};

/// Endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Provider
// ============================================================================

/// Provider backed by an HTTP chat-completion API.
pub struct RemoteProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RemoteProvider {
    /// Create a provider. The key must be non-empty; it is never validated
    /// against the API until the first call.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "remote provider requires an API key".into(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Endpoint this provider posts to.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl std::fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> std::result::Result<String, ProviderError> {
        validate_request(model, temperature, max_tokens)?;

        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        tracing::debug!(model, endpoint = %self.endpoint(), "sending chat completion");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "chat completion rejected");
            return Err(classify_failure(status, &body));
        }

        parse_completion(&body)
    }

    fn available_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }
}

/// Map a non-success response to a provider error.
fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidParameter(message)
        }
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_completion(body: &str) -> std::result::Result<String, ProviderError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed completion: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("completion contained no message".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_key() {
        assert!(matches!(
            RemoteProvider::new("  ", None, "gpt-4"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let provider = RemoteProvider::new("sk-test", Some("http://localhost:9/v1/"), "gpt-4").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:9/v1/chat/completions");
        assert_eq!(provider.available_models(), vec!["gpt-4".to_string()]);
    }

    #[test]
    fn test_classify_failure() {
        let body = r#"{"error": {"message": "Incorrect API key provided"}}"#;
        assert_eq!(
            classify_failure(StatusCode::UNAUTHORIZED, body),
            ProviderError::Authentication("Incorrect API key provided".into())
        );
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "bad"),
            ProviderError::InvalidParameter(_)
        ));
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ProviderError::Api {
                status: 429,
                message: "slow down".into()
            }
        );
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "Hi"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hi");
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion("not json"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rejects_bad_temperature_before_network() {
        let provider = RemoteProvider::new("sk-test", Some("http://127.0.0.1:9"), "gpt-4").unwrap();
        let err = provider.generate("hi", "gpt-4", 5.0, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidParameter(_)));
    }
}
