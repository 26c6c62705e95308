//! Deterministic provider for tests and offline use.

use super::{LlmProvider, validate_request};
use crate::error::ProviderError;

/// Number of prompt characters echoed back in a mock response.
const ECHO_CHARS: usize = 50;

/// Provider whose response is derived only from the prompt text.
///
/// Identical arguments always produce identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Result<String, ProviderError> {
        validate_request(model, temperature, max_tokens)?;

        let echoed: String = prompt.chars().take(ECHO_CHARS).collect();
        let ellipsis = if prompt.chars().count() > ECHO_CHARS {
            "..."
        } else {
            ""
        };
        tracing::debug!(model, chars = prompt.len(), "mock completion");
        Ok(format!("Mock response to: {echoed}{ellipsis}"))
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_is_deterministic() {
        let provider = MockProvider::new();
        let a = provider.generate("Tell me about Rust", "mock", 0.7, None).unwrap();
        let b = provider.generate("Tell me about Rust", "mock", 0.7, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "Mock response to: Tell me about Rust");
    }

    #[test]
    fn test_mock_truncates_long_prompts() {
        let prompt = "x".repeat(80);
        let response = MockProvider.generate(&prompt, "mock", 0.0, Some(10)).unwrap();
        assert_eq!(response, format!("Mock response to: {}...", "x".repeat(50)));
    }

    #[test]
    fn test_mock_rejects_bad_temperature() {
        let err = MockProvider.generate("hi", "mock", 3.0, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidParameter(_)));
    }
}
