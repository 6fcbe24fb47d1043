//! Chat data model: messages, parts, votes, chats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A tagged structured fragment embedded in a message part.
///
/// The discriminator stays a plain string: unknown discriminators must flow
/// through to the plain-text rendering path instead of failing message
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// One content fragment of a message: raw text, or a `{type, data}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePart {
    Structured(StructuredPayload),
    Text(String),
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new_user(parts: Vec<MessagePart>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role: Role::User,
            parts,
            attachments,
            created_at: Utc::now(),
        }
    }

    pub fn new_assistant(id: String, parts: Vec<MessagePart>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            parts,
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Concatenated text parts, used by the plain rendering path and for
    /// deriving chat titles.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let MessagePart::Text(text) = part {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// The last message in `messages` with the given role.
pub fn trailing_message(messages: &[Message], role: Role) -> Option<&Message> {
    messages.iter().rev().find(|message| message.role == role)
}

/// User feedback on a single message. Looked up by the renderer, owned by
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub chat_id: String,
    pub message_id: String,
    pub is_upvoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Streaming status of a conversation as seen by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Idle,
    Submitted,
    Streaming,
    Ready,
}
