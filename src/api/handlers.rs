use std::convert::Infallible;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html,
    },
    Json,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::types::{ChatForm, ErrorEvent, FragmentEvent};
use super::ServerState;
use crate::chat::{ChatMessage, ChatRole};
use crate::document::Upload;
use crate::relay::{submit_turn, RenderSurface, Submission};
use crate::session::{VisibleMessage, DEFAULT_SESSION_KEY};

const PAGE: &str = include_str!("page.html");

type EventSender = mpsc::UnboundedSender<Result<Event, Infallible>>;
type EventStream = UnboundedReceiverStream<Result<Event, Infallible>>;

/// Render surface that turns a turn into SSE events.
struct ChannelSurface {
    tx: EventSender,
}

impl ChannelSurface {
    fn send<T: serde::Serialize>(&self, name: &str, payload: &T) {
        match Event::default().event(name).json_data(payload) {
            // The browser may have gone away; the turn still completes and is stored
            Ok(event) => {
                let _ = self.tx.send(Ok(event));
            }
            Err(e) => log::error!("failed to encode {name} event: {e}"),
        }
    }
}

impl RenderSurface for ChannelSurface {
    fn render_message(&mut self, role: ChatRole, content: &str) {
        self.send(
            "message",
            &VisibleMessage {
                role,
                content: content.to_string(),
            },
        );
    }

    fn render_fragment(&mut self, fragment: &str) {
        self.send(
            "fragment",
            &FragmentEvent {
                text: fragment.to_string(),
            },
        );
    }

    fn finish_reply(&mut self, reply: &ChatMessage) {
        self.send("done", reply);
    }
}

/// Serves the chat page.
pub async fn index() -> Html<&'static str> {
    Html(PAGE)
}

/// Returns the transcript as displayed: no system message, questions without
/// their document text.
pub async fn list_messages(State(state): State<ServerState>) -> Json<Vec<VisibleMessage>> {
    let messages = match state.sessions.get(DEFAULT_SESSION_KEY).await {
        Some(session) => session.lock().await.visible(),
        None => Vec::new(),
    };
    Json(messages)
}

async fn read_form(multipart: &mut Multipart) -> Result<ChatForm, (StatusCode, String)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        (StatusCode::BAD_REQUEST, format!("Invalid form data: {e}"))
    };

    let mut form = ChatForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("question") => {
                form.question = Some(field.text().await.map_err(bad_request)?);
            }
            Some("document") => {
                let name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_request)?;
                // An empty, unnamed part is a file input with nothing chosen
                if name.is_some() || !bytes.is_empty() {
                    form.document_name = name;
                    form.document = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Handles a question submission.
///
/// # Request Format
/// `multipart/form-data` with a `question` text field and an optional
/// `document` file field.
///
/// # Response Format
/// An event stream: `message` (the displayed user entry), any number of
/// `fragment` events, then `done` with the stored reply or `error`.
pub async fn handle_chat(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Sse<EventStream>, (StatusCode, String)> {
    let form = read_form(&mut multipart).await?;

    let question = form
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "Missing question".to_string()))?;
    let upload = form
        .document
        .map(|bytes| Upload::new(form.document_name, bytes));
    let submission = Submission::new(question).with_upload(upload.as_ref());

    let session = state.sessions.get_or_init(DEFAULT_SESSION_KEY).await;
    let provider = state.provider.clone();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut session = session.lock().await;
        let mut surface = ChannelSurface { tx };
        if let Err(e) = submit_turn(&mut session, provider.as_ref(), submission, &mut surface).await
        {
            surface.send(
                "error",
                &ErrorEvent {
                    error: e.to_string(),
                },
            );
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
