//! Browser surface for chatting over HTTP.
//!
//! Serves the chat page, the visible transcript as JSON, and a multipart
//! submit endpoint that streams the reply back as Server-Sent Events.

mod handlers;
mod types;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::chat::ChatProvider;
use crate::error::LLMError;
use crate::session::SessionStore;
use handlers::{handle_chat, index, list_messages};

pub use types::{ErrorEvent, FragmentEvent};

/// Largest accepted upload request, document included
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Main server struct holding the provider and the session store
pub struct Server {
    /// Completion service every turn is relayed to
    provider: Arc<dyn ChatProvider>,
    /// Where the conversation lives between requests
    sessions: Arc<dyn SessionStore>,
}

/// Internal server state shared between request handlers
#[derive(Clone)]
struct ServerState {
    provider: Arc<dyn ChatProvider>,
    sessions: Arc<dyn SessionStore>,
}

impl Server {
    /// Creates a new server instance
    ///
    /// # Arguments
    /// * `provider` - Completion service to relay questions to
    /// * `sessions` - Store holding the conversation
    pub fn new(provider: Arc<dyn ChatProvider>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { provider, sessions }
    }

    /// Builds the router without binding a socket.
    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/v1/messages", get(list_messages))
            .route("/v1/chat", post(handle_chat))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(CorsLayer::permissive())
            .with_state(ServerState {
                provider: self.provider,
                sessions: self.sessions,
            })
    }

    /// Starts the server and listens for requests on the specified address
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (e.g. "127.0.0.1:8501")
    pub async fn run(self, addr: &str) -> Result<(), LLMError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("serving chat on http://{}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
