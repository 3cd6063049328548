//! Running a turn: one question in, one streamed answer out.
//!
//! The relay sends the whole session to a [`ChatProvider`], forwards each
//! streamed fragment to a [`RenderSurface`] as it arrives, and stores the
//! concatenated text as the assistant reply once the stream is exhausted.

use futures::StreamExt;

use crate::chat::{ChatMessage, ChatProvider, ChatRole, FragmentStream};
use crate::document::{augment_question, Document, Upload};
use crate::error::LLMError;
use crate::session::Session;

/// Something that can show a transcript and render a reply while it streams.
pub trait RenderSurface {
    /// Shows a complete transcript entry.
    fn render_message(&mut self, role: ChatRole, content: &str);

    /// Shows the next piece of the assistant reply.
    fn render_fragment(&mut self, fragment: &str);

    /// Called once the reply stream is exhausted.
    fn finish_reply(&mut self, _reply: &ChatMessage) {}
}

/// A question as submitted from a surface.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub question: String,
    pub document: Option<Document>,
}

impl Submission {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            document: None,
        }
    }

    /// Attaches a decoded document.
    pub fn with_document(mut self, document: Option<Document>) -> Self {
        self.document = document;
        self
    }

    /// Attaches an upload, decoding it now. Unusable uploads are dropped.
    pub fn with_upload(self, upload: Option<&Upload>) -> Self {
        let document = upload.and_then(Upload::decode);
        self.with_document(document)
    }
}

/// Starts a completion for `messages`.
pub async fn relay(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
) -> Result<FragmentStream, LLMError> {
    provider.chat_stream(messages).await
}

/// Drains `stream`, rendering every fragment, and returns the full text.
///
/// The first error ends the drain; text received before it is discarded.
pub async fn drain<S>(mut stream: FragmentStream, surface: &mut S) -> Result<String, LLMError>
where
    S: RenderSurface + ?Sized,
{
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        surface.render_fragment(&fragment);
        text.push_str(&fragment);
    }
    Ok(text)
}

/// Runs one turn against `session`.
///
/// The user message is appended before the provider is called and stays
/// appended if the call fails. The assistant message is appended only when
/// the whole reply has streamed.
///
/// # Errors
///
/// * `InvalidRequest` if the question is blank; nothing is appended
/// * any transport error from the provider, for this turn only
pub async fn submit_turn<S>(
    session: &mut Session,
    provider: &dyn ChatProvider,
    submission: Submission,
    surface: &mut S,
) -> Result<ChatMessage, LLMError>
where
    S: RenderSurface + ?Sized,
{
    let Submission { question, document } = submission;
    if question.trim().is_empty() {
        return Err(LLMError::InvalidRequest("question is empty".to_string()));
    }

    let content = augment_question(document.as_ref(), &question);
    let user = ChatMessage::user().content(content).build();
    match &document {
        Some(doc) => {
            log::debug!(
                "session {}: question with document {} ({} bytes)",
                session.id(),
                doc.name().unwrap_or("<unnamed>"),
                doc.text().len()
            );
            session.append_displayed(user, question.as_str());
        }
        None => session.append(user),
    }
    surface.render_message(ChatRole::User, &question);

    let stream = relay(provider, session.all()).await.map_err(|e| {
        log::error!("session {}: completion request failed: {e}", session.id());
        e
    })?;
    let text = drain(stream, surface).await.map_err(|e| {
        log::error!("session {}: completion stream failed: {e}", session.id());
        e
    })?;

    let reply = ChatMessage::assistant().content(text).build();
    session.append(reply.clone());
    surface.finish_reply(&reply);
    log::debug!(
        "session {}: turn complete, {} messages stored",
        session.id(),
        session.len()
    );
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        messages: Vec<(ChatRole, String)>,
        fragments: Vec<String>,
        finished: usize,
    }

    impl RenderSurface for Recorder {
        fn render_message(&mut self, role: ChatRole, content: &str) {
            self.messages.push((role, content.to_string()));
        }

        fn render_fragment(&mut self, fragment: &str) {
            self.fragments.push(fragment.to_string());
        }

        fn finish_reply(&mut self, _reply: &ChatMessage) {
            self.finished += 1;
        }
    }

    /// Replies with fixed fragments and remembers what it was sent.
    struct Scripted {
        fragments: Vec<&'static str>,
        fail_midway: bool,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                fail_midway: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for Scripted {
        async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LLMError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut items: Vec<Result<String, LLMError>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            if self.fail_midway {
                items.push(Err(LLMError::HttpError("connection reset".into())));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn hello_turn_appends_user_and_assistant() {
        let provider = Scripted::new(vec!["Hi", " there", "!"]);
        let mut session = Session::default();
        let mut surface = Recorder::default();

        let reply = submit_turn(&mut session, &provider, Submission::new("Hello"), &mut surface)
            .await
            .unwrap();

        assert_eq!(reply.content, "Hi there!");
        assert_eq!(surface.fragments.concat(), reply.content);
        assert_eq!(surface.messages, vec![(ChatRole::User, "Hello".to_string())]);
        assert_eq!(surface.finished, 1);

        let roles: Vec<ChatRole> = session.all().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.visible().len(), 2);
    }

    #[tokio::test]
    async fn document_is_transmitted_but_not_displayed() {
        let provider = Scripted::new(vec!["#123"]);
        let mut session = Session::default();
        let mut surface = Recorder::default();
        let document = Document::decode(Some("invoice.txt"), b"Invoice #123").unwrap();

        submit_turn(
            &mut session,
            &provider,
            Submission::new("What is the invoice number?").with_document(Some(document)),
            &mut surface,
        )
        .await
        .unwrap();

        let sent = provider.seen.lock().unwrap()[0].clone();
        assert_eq!(
            sent[1].content,
            "Document content:\nInvoice #123\n\nQuestion: What is the invoice number?"
        );
        assert_eq!(surface.messages[0].1, "What is the invoice number?");
        assert_eq!(session.visible()[0].content, "What is the invoice number?");
    }

    #[tokio::test]
    async fn failed_stream_keeps_user_message_only() {
        let mut provider = Scripted::new(vec!["partial"]);
        provider.fail_midway = true;
        let mut session = Session::default();
        let mut surface = Recorder::default();

        let err = submit_turn(&mut session, &provider, Submission::new("Hello"), &mut surface)
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(session.len(), 2);
        assert_eq!(session.last().unwrap().role, ChatRole::User);
        assert_eq!(surface.finished, 0);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_appending() {
        let provider = Scripted::new(vec!["unused"]);
        let mut session = Session::default();
        let mut surface = Recorder::default();

        let err = submit_turn(&mut session, &provider, Submission::new("   "), &mut surface)
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::InvalidRequest(_)));
        assert_eq!(session.len(), 1);
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unusable_upload_is_skipped() {
        let provider = Scripted::new(vec!["ok"]);
        let mut session = Session::default();
        let mut surface = Recorder::default();
        let upload = Upload::new(Some("scan.pdf".into()), vec![0xff, 0xfe, 0x00]);

        submit_turn(
            &mut session,
            &provider,
            Submission::new("Summarize").with_upload(Some(&upload)),
            &mut surface,
        )
        .await
        .unwrap();

        assert_eq!(session.all()[1].content, "Summarize");
    }
}
