//! Vizier is a small document-aware chat relay.
//!
//! # Overview
//! A user asks questions, optionally about an uploaded text document. Each
//! question is appended to a session, the whole session is sent to an
//! OpenAI-compatible chat completion endpoint, and the streamed reply is
//! rendered as it arrives and stored once complete.
//!
//! - [`session`]: the ordered, append-only conversation
//! - [`relay`]: running a turn against a provider and a render surface
//! - [`document`]: uploads and how they are spliced into a question
//! - [`backends`]: the OpenAI streaming client
//!
//! The `api` feature adds a browser surface served by axum; the `cli` feature
//! builds the `vizier` binary with a terminal surface.

// Re-export for convenience
pub use async_trait::async_trait;

/// Backend implementations for remote completion services
pub mod backends;

/// Builder pattern for configuring and instantiating providers
pub mod builder;

/// Chat messages, the provider trait and SSE fragment decoding
pub mod chat;

/// Startup configuration resolution
pub mod config;

/// Uploaded documents
pub mod document;

/// Error types and handling
pub mod error;

/// Turn handling and streamed reply relay
pub mod relay;

/// Secret store for storing API keys and other sensitive information
pub mod secret_store;

/// Conversation state and the process-lifetime session store
pub mod session;

#[cfg(feature = "api")]
pub mod api;

pub use chat::{ChatMessage, ChatProvider, ChatRole, FragmentStream};
pub use error::LLMError;
pub use relay::{submit_turn, RenderSurface, Submission};
pub use session::Session;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
