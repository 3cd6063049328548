use std::fmt;

/// Error types that can occur while running a chat session.
#[derive(Debug)]
pub enum LLMError {
    /// Startup configuration problems, such as a missing API key
    ConfigError(String),
    /// HTTP request/response errors
    HttpError(String),
    /// Authentication and authorization errors
    AuthError(String),
    /// Invalid request parameters or format
    InvalidRequest(String),
    /// Errors returned by the LLM provider
    ProviderError(String),
    /// The provider answered with something that could not be decoded
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    JsonError(String),
    /// An uploaded document could not be turned into text
    DocumentError(String),
    /// Local filesystem errors (secret store, uploads read from disk)
    Io(std::io::Error),
}

impl fmt::Display for LLMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMError::ConfigError(e) => write!(f, "Configuration Error: {e}"),
            LLMError::HttpError(e) => write!(f, "HTTP Error: {e}"),
            LLMError::AuthError(e) => write!(f, "Auth Error: {e}"),
            LLMError::InvalidRequest(e) => write!(f, "Invalid Request: {e}"),
            LLMError::ProviderError(e) => write!(f, "Provider Error: {e}"),
            LLMError::ResponseFormatError {
                message,
                raw_response,
            } => write!(f, "Response Format Error: {message}. Raw response: {raw_response}"),
            LLMError::JsonError(e) => write!(f, "JSON Parse Error: {e}"),
            LLMError::DocumentError(e) => write!(f, "Document Error: {e}"),
            LLMError::Io(e) => write!(f, "IO Error: {e}"),
        }
    }
}

impl std::error::Error for LLMError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LLMError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl LLMError {
    /// Whether the error came from talking to the remote completion service.
    ///
    /// These end the current turn but leave the session usable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LLMError::HttpError(_)
                | LLMError::AuthError(_)
                | LLMError::ProviderError(_)
                | LLMError::ResponseFormatError { .. }
        )
    }
}

/// Converts reqwest HTTP errors into LLMErrors
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for LLMError {
    fn from(err: std::io::Error) -> Self {
        LLMError::Io(err)
    }
}
