use serde::{Deserialize, Serialize};

/// Payload of a `fragment` event: the next piece of the reply
#[derive(Debug, Serialize, Deserialize)]
pub struct FragmentEvent {
    pub text: String,
}

/// Payload of an `error` event: the turn failed
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: String,
}

/// Fields read from a chat submission form
#[derive(Debug, Default)]
pub(crate) struct ChatForm {
    pub question: Option<String>,
    pub document_name: Option<String>,
    pub document: Option<Vec<u8>>,
}
