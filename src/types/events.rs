//! Events delivered to clients over the streaming channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A batch of generated text for one assistant message.
    MessageContent { message_id: String, content: String },
    /// The assistant message finished streaming.
    MessageComplete { message_id: String },
    /// Generation failed after the stream was already open.
    MessageError { message_id: String, error: String },
}

impl StreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageContent { .. } => "message",
            Self::MessageComplete { .. } => "complete",
            Self::MessageError { .. } => "message-error",
        }
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
