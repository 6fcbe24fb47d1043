//! Server-rendered chat pages.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Html;
use uuid::Uuid;

use crate::render::messages::{render_messages, RenderInputs};
use crate::state::AppState;
use crate::types::{AppError, ChatStatus, Visibility};

/// Fresh conversation with a newly minted chat id.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let chat_id = Uuid::now_v7().to_string();
    let html = state.templates.render_chat_page(&chat_id, "")?;
    Ok(Html(html))
}

/// Existing conversation: project the persisted messages and votes through
/// the classifier into the page.
pub async fn chat_page(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let session = state
        .auth
        .authenticate(&headers)
        .ok_or(AppError::Unauthorized)?;

    let chat = state
        .store
        .get_chat(&chat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("chat {chat_id}")))?;
    if chat.visibility == Visibility::Private && chat.user_id != session.user_id {
        return Err(AppError::Forbidden("chat belongs to another user".to_string()));
    }

    let messages = state.store.messages_by_chat(&chat_id).await?;
    let votes = state.store.votes_by_chat(&chat_id).await?;

    let pass = render_messages(&RenderInputs {
        messages,
        votes,
        status: ChatStatus::Ready,
        has_sent_message: false,
        artifact_visible: false,
    });

    let html = state.templates.render_chat_page(&chat_id, &pass.to_html())?;
    Ok(Html(html))
}
