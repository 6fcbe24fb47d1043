//! Chat API handlers: the streaming request flow, stop, and delete.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::Sse;
use axum::response::Json;
use chrono::{Duration, Utc};
use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::stream::{sse_response, EventStream};
use crate::services::model::{system_prompt, CompletionRequest, RequestHints};
use crate::services::streaming::StreamingBuffer;
use crate::services::template::truncate_text;
use crate::state::AppState;
use crate::types::{
    AppError, AppResult, Attachment, Chat, Message, MessagePart, Role, StreamEvent, Visibility,
};

const TITLE_MAX_CHARS: usize = 80;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub id: String,
    pub message: IncomingMessage,
    #[serde(default)]
    pub selected_visibility_type: Visibility,
}

/// The user turn as sent by the client. The id is client-assigned.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Handle chat message submission: persist the user turn, start the model
/// stream, and return the SSE response immediately.
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Sse<EventStream>, AppError> {
    let body: ChatRequestBody = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("malformed chat request".to_string()))?;
    if body.message.parts.is_empty() {
        return Err(AppError::BadRequest("message has no parts".to_string()));
    }

    let session = state
        .auth
        .authenticate(&headers)
        .ok_or(AppError::Unauthorized)?;

    let window = Duration::hours(state.config.rate_limit_window_hours);
    let sent = state
        .store
        .message_count_by_user(&session.user_id, window)
        .await?;
    let limit = session.user_type.daily_message_limit();
    if sent >= limit {
        return Err(AppError::RateLimited(format!(
            "daily limit of {limit} messages reached"
        )));
    }

    let user_message = Message {
        id: body.message.id.clone(),
        role: Role::User,
        parts: body.message.parts.clone(),
        attachments: body.message.attachments.clone(),
        created_at: Utc::now(),
    };

    match state.store.get_chat(&body.id).await? {
        None => {
            state
                .store
                .save_chat(Chat {
                    id: body.id.clone(),
                    user_id: session.user_id.clone(),
                    title: derive_title(&user_message),
                    visibility: body.selected_visibility_type,
                    created_at: Utc::now(),
                })
                .await?;
        }
        Some(chat) if chat.user_id != session.user_id => {
            return Err(AppError::Forbidden("chat belongs to another user".to_string()));
        }
        Some(_) => {}
    }

    let previous = state.store.messages_by_chat(&body.id).await?;
    let messages = append_client_message(previous, user_message.clone());

    state
        .store
        .save_messages(&body.id, std::slice::from_ref(&user_message))
        .await?;

    state.analytics.track(
        "chat_submitted",
        json!({
            "chatId": body.id,
            "messageLength": user_message.text_content().len(),
        }),
    );

    let stream_id = Uuid::now_v7().to_string();
    state.store.create_stream_id(&stream_id, &body.id).await?;

    let registry = state.stream_registry();
    let (sender, cancel) = registry.register(&stream_id, &body.id).await;
    let receiver = sender.subscribe();

    let hints = RequestHints::from_headers(&headers);
    let request = CompletionRequest {
        model: state.config.model_name.clone(),
        system_prompt: system_prompt(&hints),
        messages,
    };

    tracing::info!(chat_id = %body.id, %stream_id, "starting response stream");
    tokio::spawn(run_generation(
        state.clone(),
        body.id,
        stream_id,
        user_message,
        request,
        sender,
        cancel,
    ));

    Ok(sse_response(receiver))
}

/// Drives the model stream into the broadcast channel, then hands the
/// assembled response to the completion side-channel. A client stop skips
/// the side-channel: partial output is never persisted.
async fn run_generation(
    state: AppState,
    chat_id: String,
    stream_id: String,
    user_message: Message,
    request: CompletionRequest,
    sender: broadcast::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let assistant_id = Uuid::now_v7().to_string();
    let mut buffer = StreamingBuffer::new(sender, assistant_id.clone());

    match stream_model_response(&state, request, &mut buffer, &cancel).await {
        Ok(Some(full_text)) => {
            buffer.complete();
            let response = vec![Message::new_assistant(
                assistant_id,
                vec![MessagePart::text(full_text)],
            )];
            state
                .completion
                .on_finish(&chat_id, &user_message, &response)
                .await;
        }
        Ok(None) => {
            tracing::info!(%chat_id, "stream cancelled by client, skipping persistence");
            buffer.complete();
        }
        Err(e) => {
            tracing::error!(%chat_id, error = %e, "model stream failed");
            buffer.error("generation failed".to_string());
        }
    }

    state.stream_registry().finish(&stream_id).await;
}

/// `Ok(Some(text))` on natural completion, `Ok(None)` when cancelled.
async fn stream_model_response(
    state: &AppState,
    request: CompletionRequest,
    buffer: &mut StreamingBuffer,
    cancel: &CancellationToken,
) -> AppResult<Option<String>> {
    let mut chunks = state.model.stream_completion(request).await?;
    let mut full_text = String::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            chunk = chunks.next() => match chunk {
                Some(Ok(content)) => {
                    buffer.push(&content);
                    full_text.push_str(&content);
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(Some(full_text)),
            },
        }
    }
}

/// Cancel the in-flight stream for a chat.
pub async fn stop_stream(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let session = state
        .auth
        .authenticate(&headers)
        .ok_or(AppError::Unauthorized)?;

    let chat = state
        .store
        .get_chat(&chat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("chat {chat_id}")))?;
    if chat.user_id != session.user_id {
        return Err(AppError::Forbidden("chat belongs to another user".to_string()));
    }

    let stopped = state.stream_registry().cancel_chat(&chat_id).await;
    Ok(Json(json!({ "stopped": stopped })))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Chat>, AppError> {
    let session = state
        .auth
        .authenticate(&headers)
        .ok_or(AppError::Unauthorized)?;

    let chat = state
        .store
        .get_chat(&chat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("chat {chat_id}")))?;
    if chat.user_id != session.user_id {
        return Err(AppError::Forbidden("chat belongs to another user".to_string()));
    }

    let deleted = state.store.delete_chat(&chat_id).await?;
    Ok(Json(deleted))
}

/// Replace-or-append the client message into the loaded history.
fn append_client_message(mut messages: Vec<Message>, message: Message) -> Vec<Message> {
    match messages.iter_mut().find(|row| row.id == message.id) {
        Some(existing) => *existing = message,
        None => messages.push(message),
    }
    messages
}

fn derive_title(message: &Message) -> String {
    let text = message.text_content();
    let line = text.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return "New chat".to_string();
    }
    truncate_text(line, TITLE_MAX_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replaces_existing_message_by_id() {
        let existing = Message::new_user(vec![MessagePart::text("old")], Vec::new());
        let mut replacement = existing.clone();
        replacement.parts = vec![MessagePart::text("new")];

        let merged = append_client_message(vec![existing], replacement);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text_content(), "new");

        let appended = append_client_message(
            merged,
            Message::new_user(vec![MessagePart::text("next")], Vec::new()),
        );
        assert_eq!(appended.len(), 2);
    }

    #[test]
    fn title_comes_from_first_text_line() {
        let message = Message::new_user(
            vec![MessagePart::text("Find me a hotel in Kaohsiung\nwith a pool")],
            Vec::new(),
        );
        assert_eq!(derive_title(&message), "Find me a hotel in Kaohsiung");

        let long = "x".repeat(200);
        let message = Message::new_user(vec![MessagePart::text(long)], Vec::new());
        assert_eq!(derive_title(&message).chars().count(), TITLE_MAX_CHARS + 3);

        let empty = Message::new_user(vec![MessagePart::text("")], Vec::new());
        assert_eq!(derive_title(&empty), "New chat");
    }

    #[test]
    fn request_body_defaults_visibility_to_private() {
        let body: ChatRequestBody = serde_json::from_value(json!({
            "id": "c1",
            "message": {"id": "m1", "parts": ["hi"]},
        }))
        .unwrap();
        assert_eq!(body.selected_visibility_type, Visibility::Private);
        assert!(body.message.attachments.is_empty());
    }
}
