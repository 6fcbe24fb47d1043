//! Widget interaction events forwarded to the analytics collaborator.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::types::AppError;

const ALLOWED_EVENTS: &[&str] = &["card_favorited", "hotel_card_clicked", "chat_submitted"];

#[derive(Debug, Deserialize)]
pub struct TrackRequestBody {
    pub event: String,
    #[serde(default)]
    pub properties: Value,
}

pub async fn track_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let body: TrackRequestBody = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("malformed track request".to_string()))?;

    if !ALLOWED_EVENTS.contains(&body.event.as_str()) {
        return Err(AppError::BadRequest(format!(
            "unknown event {}",
            body.event
        )));
    }
    if !body.properties.is_object() && !body.properties.is_null() {
        return Err(AppError::BadRequest(
            "properties must be an object".to_string(),
        ));
    }

    // Anonymous interactions are attributed to the guest sentinel.
    let user_id = state
        .auth
        .authenticate(&headers)
        .map(|session| session.user_id)
        .unwrap_or_else(|| "guest".to_string());

    let mut properties = body.properties;
    properties["userId"] = json!(user_id);

    state.analytics.track(&body.event, properties);
    Ok(StatusCode::NO_CONTENT)
}
