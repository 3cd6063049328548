use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::LLMError;

/// A finite, single-consumer stream of text fragments produced by one
/// completion call. Concatenating the fragments yields the full reply.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// Role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The fixed instruction that opens every session
    System,
    /// The user/human participant in the conversation
    User,
    /// The AI assistant participant in the conversation
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of who sent this message
    pub role: ChatRole,
    /// The text content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new builder for a system message
    pub fn system() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::System)
    }

    /// Create a new builder for a user message
    pub fn user() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::User)
    }

    /// Create a new builder for an assistant message
    pub fn assistant() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::Assistant)
    }
}

/// Builder for ChatMessage
#[derive(Debug)]
pub struct ChatMessageBuilder {
    role: ChatRole,
    content: String,
}

impl ChatMessageBuilder {
    /// Create a new ChatMessageBuilder with specified role
    pub fn new(role: ChatRole) -> Self {
        Self {
            role,
            content: String::new(),
        }
    }

    /// Set the message content
    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Build the ChatMessage
    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
        }
    }
}

/// Trait for providers that support streamed chat completions.
#[async_trait]
pub trait ChatProvider: Sync + Send {
    /// Sends the conversation to the provider and returns the reply as a
    /// stream of text fragments.
    ///
    /// # Arguments
    ///
    /// * `messages` - The full conversation, system message first
    ///
    /// # Returns
    ///
    /// A stream of text fragments, or an error if the request could not be
    /// started (network, authentication, non-success status)
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LLMError>;

    /// Sends the conversation and waits for the whole reply.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LLMError> {
        let mut stream = self.chat_stream(messages).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Splits a Server-Sent Events byte stream into `data:` payloads.
///
/// Network chunks do not respect line boundaries (or UTF-8 boundaries), so
/// bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Feeds a chunk and returns the `data:` payloads of every completed line.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Returns the payload of a trailing line that was never terminated.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).to_string())
}

/// Marker payload that ends an OpenAI-style event stream.
pub(crate) const SSE_DONE: &str = "[DONE]";

struct SseState<S, F> {
    bytes: S,
    lines: SseLineBuffer,
    parser: F,
    queued: VecDeque<Result<String, LLMError>>,
    done: bool,
}

impl<S, F> SseState<S, F>
where
    F: Fn(&str) -> Result<Option<String>, LLMError>,
{
    /// Parses payloads into queued fragments. Returns false once the stream
    /// has ended, either on `[DONE]` or on the first parse error.
    fn enqueue(&mut self, payloads: Vec<String>) -> bool {
        for data in payloads {
            if data == SSE_DONE {
                return false;
            }
            match (self.parser)(&data) {
                Ok(Some(fragment)) => self.queued.push_back(Ok(fragment)),
                Ok(None) => {}
                Err(e) => {
                    self.queued.push_back(Err(e));
                    return false;
                }
            }
        }
        true
    }
}

/// Turns a raw SSE byte stream into a [`FragmentStream`].
///
/// `parser` maps one `data:` payload to an optional text fragment. The
/// stream ends at `[DONE]` or after the first error. A body that closes
/// without `[DONE]` yields a trailing `ResponseFormatError`, so a cut-off
/// reply is never mistaken for a complete one.
pub(crate) fn sse_fragments<S, B, E, F>(bytes: S, parser: F) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(&str) -> Result<Option<String>, LLMError> + Send + 'static,
{
    let state = SseState {
        bytes,
        lines: SseLineBuffer::default(),
        parser,
        queued: VecDeque::new(),
        done: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queued.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.lines.push(chunk.as_ref());
                    state.done = !state.enqueue(payloads);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LLMError::HttpError(e.to_string())), state));
                }
                None => {
                    let tail = state.lines.finish().into_iter().collect();
                    // Still open after the tail means the body closed before `[DONE]`
                    if state.enqueue(tail) {
                        state.queued.push_back(Err(LLMError::ResponseFormatError {
                            message: format!("stream ended before {SSE_DONE}"),
                            raw_response: String::new(),
                        }));
                    }
                    state.done = true;
                }
            }
        }
    });

    Box::pin(stream)
}

/// Creates a fragment stream from a streaming HTTP response.
///
/// # Arguments
///
/// * `response` - The HTTP response from the streaming API
/// * `parser` - Function to parse each SSE payload into optional text content
pub(crate) fn create_sse_stream<F>(response: reqwest::Response, parser: F) -> FragmentStream
where
    F: Fn(&str) -> Result<Option<String>, LLMError> + Send + 'static,
{
    sse_fragments(Box::pin(response.bytes_stream()), parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(data: &str) -> Result<Option<String>, LLMError> {
        if data.is_empty() {
            Ok(None)
        } else if data == "boom" {
            Err(LLMError::ProviderError("boom".into()))
        } else {
            Ok(Some(data.to_string()))
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<String, LLMError>> {
        stream.collect().await
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::system().content("be brief").build();
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }

    #[test]
    fn line_buffer_waits_for_newline() {
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(b"data: hel").is_empty());
        assert_eq!(lines.push(b"lo\r\n\r\n"), vec!["hello".to_string()]);
        assert!(lines.push(b": keep-alive comment\n").is_empty());
        assert!(lines.finish().is_none());
    }

    #[test]
    fn line_buffer_keeps_split_utf8_intact() {
        let bytes = "data: café\n".as_bytes();
        let split = bytes.len() - 2;
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(&bytes[..split]).is_empty());
        assert_eq!(lines.push(&bytes[split..]), vec!["café".to_string()]);
    }

    #[tokio::test]
    async fn stream_stops_at_done_marker() {
        let body = chunks(&[b"data: one\n\ndata: tw", b"o\n\ndata: [DONE]\n\ndata: late\n\n"]);
        let out = collect(sse_fragments(body, passthrough)).await;
        let texts: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn unterminated_done_marker_ends_cleanly() {
        let body = chunks(&[b"data: only\n\ndata: [DO", b"NE]"]);
        let out = collect(sse_fragments(body, passthrough)).await;
        let texts: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["only"]);
    }

    #[tokio::test]
    async fn body_closing_without_done_is_an_error() {
        let body = chunks(&[b"data: The invoice\n\n"]);
        let out = collect(sse_fragments(body, passthrough)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "The invoice");
        assert!(matches!(out[1], Err(LLMError::ResponseFormatError { .. })));
    }

    #[tokio::test]
    async fn stream_ends_after_parse_error() {
        let body = chunks(&[b"data: a\n\ndata: boom\n\ndata: b\n\n"]);
        let out = collect(sse_fragments(body, passthrough)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "a");
        assert!(matches!(out[1], Err(LLMError::ProviderError(_))));
    }

    #[tokio::test]
    async fn transport_error_is_reported() {
        let body = stream::iter(vec![
            Ok(b"data: a\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let out = collect(sse_fragments(body, passthrough)).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(LLMError::HttpError(_))));
    }
}
