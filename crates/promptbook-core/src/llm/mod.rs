//! LLM provider abstraction.
//!
//! Prompt cells call through [`LlmProvider`]; backends are interchangeable:
//!
//! - **`MockProvider`** - deterministic, content-derived responses for tests and offline use.
//! - **`RemoteProvider`** - an OpenAI-compatible chat-completion endpoint over HTTP.
//!
//! A provider makes exactly one attempt per call. Retries, backoff and deadlines
//! belong to whatever wraps the provider, not to the provider itself.

mod config;
mod mock;
mod remote;

pub use config::{
    API_KEY_ENV, DEFAULT_MODEL, DEFAULT_TEMPERATURE, ProviderConfig, ProviderKind, Settings,
    build_provider, resolve_credential,
};
pub use mock::MockProvider;
pub use remote::{DEFAULT_BASE_URL, RemoteProvider};

use crate::error::ProviderError;

/// Lowest accepted sampling temperature.
pub const MIN_TEMPERATURE: f64 = 0.0;

/// Highest accepted sampling temperature.
pub const MAX_TEMPERATURE: f64 = 2.0;

/// A backend able to produce a text completion for a prompt.
pub trait LlmProvider: Send + Sync {
    /// Short name for logs and display.
    fn name(&self) -> &str;

    /// Generate a completion. One attempt; failures surface immediately.
    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Result<String, ProviderError>;

    /// Models this provider can serve.
    fn available_models(&self) -> Vec<String>;
}

/// Reject temperatures outside `[0.0, 2.0]` instead of clamping them.
pub fn validate_temperature(temperature: f64) -> Result<(), ProviderError> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(ProviderError::InvalidParameter(format!(
            "temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {temperature}"
        )));
    }
    Ok(())
}

/// Check the parameters shared by every backend.
pub(crate) fn validate_request(
    model: &str,
    temperature: f64,
    max_tokens: Option<u32>,
) -> Result<(), ProviderError> {
    validate_temperature(temperature)?;
    if model.trim().is_empty() {
        return Err(ProviderError::InvalidParameter("model must not be empty".into()));
    }
    if max_tokens == Some(0) {
        return Err(ProviderError::InvalidParameter(
            "max_tokens must be greater than zero".into(),
        ));
    }
    Ok(())
}
