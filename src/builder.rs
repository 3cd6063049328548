//! Builder module for configuring and instantiating the completion provider.

use crate::{backends::openai::OpenAI, chat::ChatProvider, error::LLMError};

/// Builder for configuring and instantiating a chat provider.
#[derive(Default)]
pub struct ProviderBuilder {
    /// API key for authentication with the provider
    api_key: Option<String>,
    /// Base URL for API requests
    base_url: Option<String>,
    /// Model identifier/name to use
    model: Option<String>,
    /// Maximum tokens to generate in responses
    max_tokens: Option<u32>,
    /// Temperature parameter for controlling response randomness (0.0-1.0)
    temperature: Option<f32>,
    /// Request timeout duration in seconds
    timeout_seconds: Option<u64>,
}

impl ProviderBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the temperature for controlling response randomness (0.0-1.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Builds and returns a configured provider instance.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no API key was set or the base URL is invalid.
    pub fn build(self) -> Result<Box<dyn ChatProvider>, LLMError> {
        let api_key = self
            .api_key
            .ok_or_else(|| LLMError::ConfigError("No API key provided".to_string()))?;

        let provider = OpenAI::new(
            api_key,
            self.base_url,
            self.model,
            self.max_tokens,
            self.temperature,
            self.timeout_seconds,
        )?;

        Ok(Box::new(provider))
    }
}
