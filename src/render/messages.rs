//! Message classifier/renderer: projects the conversation state into one
//! render decision per message plus the trailing "thinking" indicator.
//!
//! Pure and synchronous: no I/O happens here. The HTML emitted for each view
//! matches the fragments the streaming handlers send, so a server-rendered
//! page and a live stream converge on the same markup.

use serde_json::Value;

use crate::render::hotel_card::{HotelCardData, HotelCardView};
use crate::types::{Attachment, ChatStatus, Message, MessagePart, Role, StructuredPayload, Vote};

pub const HOTEL_CARD_KIND: &str = "hotel_card";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderInputs {
    pub messages: Vec<Message>,
    pub votes: Vec<Vote>,
    pub status: ChatStatus,
    pub has_sent_message: bool,
    pub artifact_visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlainView {
    pub message_id: String,
    pub role: Role,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub is_loading: bool,
    pub vote: Option<Vote>,
    pub requires_scroll_padding: bool,
}

/// One render decision per message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageView {
    /// Empty `parts`: render nothing for this message.
    Hidden { message_id: String },
    HotelCard {
        message_id: String,
        card: HotelCardView,
    },
    Plain(PlainView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub views: Vec<MessageView>,
    /// Ephemeral "assistant is thinking" indicator; not a persisted message.
    pub thinking: bool,
}

pub fn render_messages(inputs: &RenderInputs) -> RenderPass {
    let views = inputs
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| classify_message(message, index, inputs))
        .collect();

    let thinking = inputs.status == ChatStatus::Submitted
        && inputs
            .messages
            .last()
            .is_some_and(|last| last.role == Role::User);

    RenderPass { views, thinking }
}

fn classify_message(message: &Message, index: usize, inputs: &RenderInputs) -> MessageView {
    let Some(first) = message.parts.first() else {
        return MessageView::Hidden {
            message_id: message.id.clone(),
        };
    };

    // Decode step: a structured part is used directly, a string part is
    // parsed. Failures fall through to the plain path and never abort the
    // rest of the list.
    let payload = match first {
        MessagePart::Structured(payload) => Some(payload.clone()),
        MessagePart::Text(text) => match serde_json::from_str::<StructuredPayload>(text) {
            Ok(payload) => Some(payload),
            Err(_) => {
                tracing::debug!(message_id = %message.id, "first part is plain text");
                None
            }
        },
    };

    if let Some(payload) = payload {
        if payload.kind == HOTEL_CARD_KIND {
            match serde_json::from_value::<HotelCardData>(payload.data) {
                Ok(data) => {
                    return MessageView::HotelCard {
                        message_id: message.id.clone(),
                        card: HotelCardView::from_data(data),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        error = %e,
                        "malformed hotel card payload, falling back to text"
                    );
                }
            }
        }
        // Unrecognized discriminators take the plain path as well.
    }

    let is_last = index + 1 == inputs.messages.len();
    MessageView::Plain(PlainView {
        message_id: message.id.clone(),
        role: message.role,
        text: plain_text(message),
        attachments: message.attachments.clone(),
        is_loading: inputs.status == ChatStatus::Streaming && is_last,
        vote: inputs
            .votes
            .iter()
            .find(|vote| vote.message_id == message.id)
            .cloned(),
        requires_scroll_padding: inputs.has_sent_message && is_last,
    })
}

/// Text for the plain path: the joined text parts, or the serialized first
/// part when the message carries only structured content.
fn plain_text(message: &Message) -> String {
    let text = message.text_content();
    if !text.is_empty() {
        return text;
    }
    match message.parts.first() {
        Some(MessagePart::Structured(payload)) => {
            serde_json::to_value(payload).map_or_else(|_| String::new(), |value: Value| value.to_string())
        }
        _ => String::new(),
    }
}

/// Memoizing wrapper around [`render_messages`].
///
/// Skips re-rendering only when the artifact panel was visible on both the
/// previous and the next invocation; otherwise recomputes whenever status,
/// message count, message contents, or votes change.
#[derive(Default)]
pub struct MessageRenderer {
    last: Option<(RenderInputs, RenderPass)>,
}

impl MessageRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, inputs: RenderInputs) -> RenderPass {
        if let Some((prev_inputs, prev_pass)) = &self.last {
            if !should_rerender(prev_inputs, &inputs) {
                return prev_pass.clone();
            }
        }

        let pass = render_messages(&inputs);
        self.last = Some((inputs, pass.clone()));
        pass
    }
}

fn should_rerender(prev: &RenderInputs, next: &RenderInputs) -> bool {
    if prev.artifact_visible && next.artifact_visible {
        return false;
    }

    prev.status != next.status
        || prev.messages.len() != next.messages.len()
        || prev.messages != next.messages
        || prev.votes != next.votes
}

impl MessageView {
    pub fn to_html(&self) -> String {
        match self {
            Self::Hidden { .. } => String::new(),
            Self::HotelCard { card, .. } => card.to_html(),
            Self::Plain(view) => view.to_html(),
        }
    }
}

impl PlainView {
    pub fn to_html(&self) -> String {
        let mut classes = format!("message {}", self.role);
        if self.requires_scroll_padding {
            classes.push_str(" scroll-padding");
        }

        let mut bubble = html_escape::encode_text(&self.text).to_string();
        if self.is_loading {
            bubble.push_str(r#"<span class="cursor"></span>"#);
        }

        let attachments = if self.attachments.is_empty() {
            String::new()
        } else {
            let items: String = self
                .attachments
                .iter()
                .map(|attachment| {
                    format!(
                        r#"<a class="attachment" href="{}">{}</a>"#,
                        html_escape::encode_double_quoted_attribute(&attachment.url),
                        html_escape::encode_text(&attachment.name)
                    )
                })
                .collect();
            format!(r#"<div class="attachments">{items}</div>"#)
        };

        let vote = match &self.vote {
            Some(vote) if vote.is_upvoted => r#"<span class="vote vote-up">&#9650;</span>"#,
            Some(_) => r#"<span class="vote vote-down">&#9660;</span>"#,
            None => "",
        };

        format!(
            r#"<div class="{classes}" id="msg-{id}">
    {attachments}<div class="message-bubble">{bubble}</div>{vote}
</div>"#,
            id = html_escape::encode_double_quoted_attribute(&self.message_id),
        )
    }
}

pub fn thinking_indicator_html() -> &'static str {
    r#"<div class="message assistant thinking">
    <div class="message-bubble"><span class="loading">Thinking...</span></div>
</div>"#
}

impl RenderPass {
    pub fn to_html(&self) -> String {
        let mut html: String = self.views.iter().map(|view| view.to_html()).collect();
        if self.thinking {
            html.push_str(thinking_indicator_html());
        }
        html
    }
}
