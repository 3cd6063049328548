//! Startup configuration.
//!
//! Values come from, in order of precedence: explicit overrides (command
//! line), the secret store, the process environment, then built-in defaults.
//! The API key has no default; without it nothing else can start.

use crate::backends::openai::DEFAULT_MODEL;
use crate::builder::ProviderBuilder;
use crate::chat::ChatProvider;
use crate::error::LLMError;
use crate::secret_store::SecretStore;
use crate::session::DEFAULT_SYSTEM_PROMPT;

/// Secret store key and environment variable holding the credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable that can point the client at another endpoint
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Values supplied explicitly, typically from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl Settings {
    /// Resolves settings against the secret store and process environment.
    pub fn resolve(overrides: Overrides, secrets: Option<&SecretStore>) -> Result<Self, LLMError> {
        Self::resolve_with_env(overrides, secrets, |var| std::env::var(var).ok())
    }

    /// Like [`Settings::resolve`], with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// * `ConfigError` if no non-empty API key is found anywhere
    pub fn resolve_with_env<F>(
        overrides: Overrides,
        secrets: Option<&SecretStore>,
        env: F,
    ) -> Result<Self, LLMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_key = non_empty(overrides.api_key)
            .or_else(|| non_empty(secrets.and_then(|s| s.get(API_KEY_VAR).cloned())))
            .or_else(|| non_empty(env(API_KEY_VAR)))
            .ok_or_else(|| {
                LLMError::ConfigError(format!(
                    "{API_KEY_VAR} is not set; pass --api-key, run `vizier set {API_KEY_VAR} <key>`, or export it"
                ))
            })?;

        let model = non_empty(overrides.model)
            .or_else(|| non_empty(secrets.and_then(|s| s.get_default_model().cloned())))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = non_empty(overrides.base_url).or_else(|| non_empty(env(BASE_URL_VAR)));

        Ok(Self {
            api_key,
            model,
            base_url,
            system_prompt: overrides
                .system
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: overrides.temperature,
            max_tokens: overrides.max_tokens,
            timeout_seconds: overrides.timeout_seconds,
        })
    }

    /// Builds the completion provider these settings describe.
    pub fn provider(&self) -> Result<Box<dyn ChatProvider>, LLMError> {
        let mut builder = ProviderBuilder::new()
            .api_key(self.api_key.clone())
            .model(self.model.clone());
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(timeout) = self.timeout_seconds {
            builder = builder.timeout_seconds(timeout);
        }
        builder.build()
    }
}
