//! SSE plumbing and the resume endpoint for in-flight streams.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;
use crate::types::{AppError, StreamEvent, Visibility};

pub type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// SSE response over a live broadcast receiver. Lagged clients skip the
/// missed batches rather than killing the connection.
pub fn sse_response(receiver: broadcast::Receiver<StreamEvent>) -> Sse<EventStream> {
    let stream: EventStream = BroadcastStream::new(receiver)
        .filter_map(|item| async move {
            match item {
                Ok(event) => Some(Ok(Event::default()
                    .event(event.event_type())
                    .data(event.to_sse_data()))),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "sse client lagged behind stream");
                    None
                }
            }
        })
        .boxed();

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}

/// Response for a stream that already finished: one terminal event, then EOF.
fn closed_stream_response() -> Sse<EventStream> {
    let stream: EventStream = futures::stream::once(async {
        Ok(Event::default().event("complete").data("done"))
    })
    .boxed();
    Sse::new(stream)
}

/// Re-attach to the most recent stream of a chat after a disconnect.
pub async fn resume_stream(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Sse<EventStream>, AppError> {
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

    let stream_ids = state.store.stream_ids_by_chat(&chat_id).await?;
    let latest = stream_ids
        .last()
        .ok_or_else(|| AppError::NotFound(format!("no streams for chat {chat_id}")))?;

    match state.stream_registry().subscribe(latest).await {
        Some(receiver) => {
            tracing::info!(%chat_id, stream_id = %latest, "client re-attached to stream");
            Ok(sse_response(receiver))
        }
        None => Ok(closed_stream_response()),
    }
}
