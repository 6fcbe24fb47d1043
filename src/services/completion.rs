//! Completion side-channel: best-effort persistence and analytics once a
//! streamed response is fully assembled.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::services::analytics::AnalyticsHandle;
use crate::services::store::ChatStore;
use crate::types::{
    trailing_message, AppError, AppResult, Message, MessagePart, Role, StructuredPayload,
};

/// Canonical `(user, assistant)` pair for a turn: the just-sent user message
/// merged with the trailing assistant message of the response.
pub fn merge_turn(user_message: &Message, response: &[Message]) -> Option<(Message, Message)> {
    let assistant = trailing_message(response, Role::Assistant)?;
    Some((user_message.clone(), assistant.clone()))
}

pub struct CompletionSideChannel {
    store: Arc<dyn ChatStore>,
    analytics: AnalyticsHandle,
    override_payload: Option<StructuredPayload>,
}

impl CompletionSideChannel {
    pub fn new(
        store: Arc<dyn ChatStore>,
        analytics: AnalyticsHandle,
        override_payload: Option<StructuredPayload>,
    ) -> Self {
        Self {
            store,
            analytics,
            override_payload,
        }
    }

    /// Runs once per finished stream. Every failure is caught, logged and
    /// swallowed: the stream already delivered to the client must not be
    /// affected by a late persistence problem.
    pub async fn on_finish(&self, chat_id: &str, user_message: &Message, response: &[Message]) {
        self.analytics.track(
            "chat_response_finished",
            json!({
                "chatId": chat_id,
                "messageCount": response.len(),
            }),
        );

        if let Err(e) = self
            .persist_assistant_turn(chat_id, user_message, response)
            .await
        {
            tracing::error!(chat_id, error = %e, "failed to persist assistant turn");
        }
    }

    async fn persist_assistant_turn(
        &self,
        chat_id: &str,
        user_message: &Message,
        response: &[Message],
    ) -> AppResult<()> {
        let assistant_id = trailing_message(response, Role::Assistant)
            .map(|message| message.id.clone())
            .ok_or(AppError::MissingAssistantMessage)?;

        let (_, assistant) =
            merge_turn(user_message, response).ok_or(AppError::MissingAssistantMessage)?;

        let parts = match &self.override_payload {
            Some(payload) => vec![MessagePart::Structured(payload.clone())],
            None => assistant.parts,
        };
        if parts.is_empty() {
            return Err(AppError::Stream("assistant response had no parts".into()));
        }

        self.store
            .save_messages(
                chat_id,
                &[Message {
                    id: assistant_id,
                    role: Role::Assistant,
                    parts,
                    attachments: Vec::new(),
                    created_at: Utc::now(),
                }],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;
    use serde_json::json;

    fn side_channel(
        store: Arc<MemoryStore>,
        override_payload: Option<StructuredPayload>,
    ) -> (CompletionSideChannel, tokio::sync::mpsc::Receiver<crate::services::analytics::AnalyticsEvent>)
    {
        let (analytics, receiver) =
            AnalyticsHandle::paused("test".to_string(), "http://localhost".to_string(), 8);
        (
            CompletionSideChannel::new(store, analytics, override_payload),
            receiver,
        )
    }

    fn user_message() -> Message {
        Message::new_user(vec![MessagePart::text("find me a hotel")], Vec::new())
    }

    #[tokio::test]
    async fn persists_one_assistant_row_keyed_by_trailing_id() {
        let store = Arc::new(MemoryStore::new());
        let (channel, mut events) = side_channel(store.clone(), None);

        let response = vec![
            Message::new_assistant("a1".to_string(), vec![MessagePart::text("first")]),
            Message::new_assistant("a2".to_string(), vec![MessagePart::text("final answer")]),
        ];
        channel.on_finish("c1", &user_message(), &response).await;

        let rows = store.messages_by_chat("c1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a2");
        assert_eq!(rows[0].role, Role::Assistant);
        assert_eq!(rows[0].text_content(), "final answer");
        assert!(rows[0].attachments.is_empty());

        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "chat_response_finished");
        assert_eq!(event.properties["chatId"], "c1");
        assert_eq!(event.properties["messageCount"], 2);
    }

    #[tokio::test]
    async fn missing_assistant_message_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (channel, mut events) = side_channel(store.clone(), None);

        // Response contains only a user echo; no assistant turn at all.
        let response = vec![user_message()];
        channel.on_finish("c1", &user_message(), &response).await;

        assert!(store.messages_by_chat("c1").await.unwrap().is_empty());
        // The completion event still fires; only persistence is skipped.
        assert_eq!(events.recv().await.unwrap().name, "chat_response_finished");
    }

    #[tokio::test]
    async fn override_payload_replaces_model_output() {
        let store = Arc::new(MemoryStore::new());
        let payload = StructuredPayload {
            kind: "hotel_card".to_string(),
            data: json!({"name": "Grand Hi Lai Hotel"}),
        };
        let (channel, _events) = side_channel(store.clone(), Some(payload));

        let response = vec![Message::new_assistant(
            "a1".to_string(),
            vec![MessagePart::text("streamed text")],
        )];
        channel.on_finish("c1", &user_message(), &response).await;

        let rows = store.messages_by_chat("c1").await.unwrap();
        match &rows[0].parts[0] {
            MessagePart::Structured(saved) => {
                assert_eq!(saved.kind, "hotel_card");
                assert_eq!(saved.data["name"], "Grand Hi Lai Hotel");
            }
            other => panic!("expected structured part, got {other:?}"),
        }
    }

    #[test]
    fn merge_turn_recovers_the_canonical_pair() {
        let user = user_message();
        let response = vec![
            Message::new_assistant("a1".to_string(), vec![MessagePart::text("draft")]),
            Message::new_assistant("a2".to_string(), vec![MessagePart::text("final")]),
        ];

        let (merged_user, merged_assistant) = merge_turn(&user, &response).unwrap();
        assert_eq!(merged_user.id, user.id);
        assert_eq!(merged_assistant.id, "a2");

        assert!(merge_turn(&user, &[]).is_none());
    }
}
