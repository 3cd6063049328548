//! OpenAI API client implementation for streamed chat completions.
//!
//! Only the `chat/completions` endpoint is used, always with `stream: true`.
//! Any OpenAI-compatible server can be targeted by overriding the base URL.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::chat::{create_sse_stream, ChatMessage, ChatProvider, FragmentStream};
use crate::error::LLMError;

/// Default endpoint root for the hosted OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Model used when no other is configured
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER_NAME: &str = "OpenAI";
const CHAT_ENDPOINT: &str = "chat/completions";

/// Client for the OpenAI chat completions API.
pub struct OpenAI {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    client: Client,
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// One `data:` event of a streamed completion
#[derive(Deserialize, Debug)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Deserialize, Debug)]
struct ChatStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

impl OpenAI {
    /// Creates a new OpenAI client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token, must not be empty
    /// * `base_url` - Endpoint root, defaults to [`DEFAULT_BASE_URL`]
    /// * `model` - Model identifier, defaults to [`DEFAULT_MODEL`]
    /// * `max_tokens` - Optional cap on generated tokens
    /// * `temperature` - Optional sampling temperature
    /// * `timeout_seconds` - Optional whole-request timeout
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LLMError::ConfigError(format!(
                "Missing {PROVIDER_NAME} API key"
            )));
        }

        let mut base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        // Url::join drops the last path segment unless it ends with a slash
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LLMError::ConfigError(format!("Invalid base URL {base}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(std::time::Duration::from_secs(sec));
        }
        let client = builder
            .build()
            .map_err(|e| LLMError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
            temperature,
            timeout_seconds,
            client,
        })
    }
}

/// Maps one streamed payload to the text it carries.
fn parse_stream_payload(data: &str) -> Result<Option<String>, LLMError> {
    let chunk: ChatStreamChunk =
        serde_json::from_str(data).map_err(|e| LLMError::ResponseFormatError {
            message: format!("Failed to decode {PROVIDER_NAME} stream event: {e}"),
            raw_response: data.to_string(),
        })?;

    if let Some(error) = chunk.error {
        return Err(LLMError::ProviderError(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

fn status_error(status: StatusCode, body: String) -> LLMError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::AuthError(format!(
            "{PROVIDER_NAME} rejected the API key ({status}): {body}"
        )),
        _ => LLMError::ProviderError(format!(
            "{PROVIDER_NAME} API returned error status: {status}: {body}"
        )),
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LLMError> {
        let body = OpenAIChatRequest {
            model: &self.model,
            messages,
            stream: true,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = self
            .base_url
            .join(CHAT_ENDPOINT)
            .map_err(|e| LLMError::HttpError(e.to_string()))?;

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("{PROVIDER_NAME} request payload: {json}");
            }
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        log::debug!("{PROVIDER_NAME} HTTP status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(status_error(status, error_text));
        }

        Ok(create_sse_stream(response, parse_stream_payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_a_config_error() {
        let err = OpenAI::new("  ", None, None, None, None, None).err().unwrap();
        assert!(matches!(err, LLMError::ConfigError(_)));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let llm = OpenAI::new(
            "sk-test",
            Some("http://localhost:8080/v1".into()),
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            llm.base_url.join(CHAT_ENDPOINT).unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn request_body_is_streaming() {
        let messages = vec![
            ChatMessage::system().content("sys").build(),
            ChatMessage::user().content("Hello").build(),
        ];
        let body = OpenAIChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            stream: true,
            max_tokens: None,
            temperature: Some(0.5),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn payload_parsing() {
        let text = parse_stream_payload(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(text.as_deref(), Some("Hi"));

        let role_only = parse_stream_payload(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert!(role_only.unwrap().is_none());

        let empty = parse_stream_payload(r#"{"choices":[{"delta":{"content":""}}]}"#);
        assert!(empty.unwrap().is_none());

        let err = parse_stream_payload(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(matches!(err, LLMError::ProviderError(m) if m == "overloaded"));

        let bad = parse_stream_payload("not json").unwrap_err();
        assert!(matches!(bad, LLMError::ResponseFormatError { .. }));
    }

    #[test]
    fn unauthorized_maps_to_auth_error() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope".into()),
            LLMError::AuthError(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "down".into()),
            LLMError::ProviderError(_)
        ));
    }
}
