//! Chat-completion collaborator: the `CompletionModel` contract, an HTTP
//! implementation against an OpenAI-style endpoint, and a canned scripted
//! model used when no endpoint is configured.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};

use crate::types::{AppError, AppResult, Message};

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

/// Streams response text chunks for a conversation. The caller assembles the
/// chunks into the final assistant message.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>>;
}

/// Optional geo hints folded into the system prompt.
#[derive(Debug, Clone, Default)]
pub struct RequestHints {
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl RequestHints {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            city: get("x-geo-city"),
            country: get("x-geo-country"),
            latitude: get("x-geo-latitude"),
            longitude: get("x-geo-longitude"),
        }
    }
}

pub fn system_prompt(hints: &RequestHints) -> String {
    let mut prompt = String::from(
        "You are a travel concierge assistant. Help the user find hotels and \
         plan stays. When you recommend a specific hotel, answer with a \
         hotel_card structured payload; otherwise answer in plain text.",
    );

    if let (Some(city), Some(country)) = (&hints.city, &hints.country) {
        prompt.push_str(&format!("\n\nThe user is located near {city}, {country}."));
    }
    if let (Some(lat), Some(lon)) = (&hints.latitude, &hints.longitude) {
        prompt.push_str(&format!("\nApproximate coordinates: {lat}, {lon}."));
    }

    prompt
}

/// Streaming client for an OpenAI-style `/v1/chat/completions` endpoint.
pub struct HttpCompletionModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCompletionModel {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl CompletionModel for HttpCompletionModel {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        for message in &request.messages {
            messages.push(json!({
                "role": message.role.to_string(),
                "content": message.text_content(),
            }));
        }

        let body = json!({
            "model": request.model,
            "stream": true,
            "messages": messages,
        });

        let url = format!(
            "{}/v1/chat/completions",
            self.endpoint.trim_end_matches('/')
        );
        let mut http = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| AppError::Stream(format!("model request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Stream(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = async_stream::stream! {
            let mut buf = String::new();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::Stream(format!("model stream failed: {e}")));
                        break 'read;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buf.find('\n') {
                    let line: String = buf.drain(..=newline).collect();
                    match parse_stream_line(&line) {
                        Some(StreamLine::Done) => break 'read,
                        Some(StreamLine::Delta(content)) => yield Ok(content),
                        None => {}
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

enum StreamLine {
    Delta(String),
    Done,
}

/// One `data:` line of the upstream SSE body. Malformed chunks are skipped,
/// not fatal.
fn parse_stream_line(line: &str) -> Option<StreamLine> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(StreamLine::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed model chunk");
            return None;
        }
    };

    let content = value["choices"][0]["delta"]["content"].as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(StreamLine::Delta(content.to_string()))
}

const CANNED_REPLY: &str = "Happy to help plan your stay! Tell me where you \
are headed and your dates, and I will pull up a few hotels worth a look.";

/// Scripted model: emits the reply word by word with a small delay, so the
/// full streaming path can run without a model endpoint.
pub struct CannedModel {
    reply: String,
    delay: Duration,
}

impl CannedModel {
    pub fn new(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            reply: reply.into(),
            delay,
        }
    }
}

impl Default for CannedModel {
    fn default() -> Self {
        Self::new(CANNED_REPLY, Duration::from_millis(20))
    }
}

#[async_trait]
impl CompletionModel for CannedModel {
    async fn stream_completion(
        &self,
        _request: CompletionRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let words: Vec<String> = self
            .reply
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect();
        let delay = self.delay;

        let stream = async_stream::stream! {
            for word in words {
                tokio::time::sleep(delay).await;
                yield Ok(word);
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_model_streams_words_in_order() {
        let model = CannedModel::new("one two three", Duration::from_millis(1));
        let request = CompletionRequest {
            model: "canned".to_string(),
            system_prompt: String::new(),
            messages: Vec::new(),
        };

        let chunks: Vec<String> = model
            .stream_completion(request)
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.join(""), "one two three ");
    }

    #[test]
    fn stream_line_extracts_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        match parse_stream_line(line) {
            Some(StreamLine::Delta(content)) => assert_eq!(content, "Hel"),
            _ => panic!("expected delta"),
        }
        assert!(matches!(
            parse_stream_line("data: [DONE]"),
            Some(StreamLine::Done)
        ));
        assert!(parse_stream_line(": keep-alive").is_none());
        assert!(parse_stream_line("data: not-json").is_none());
    }

    #[test]
    fn system_prompt_folds_in_geo_hints() {
        let hints = RequestHints {
            city: Some("Kaohsiung".to_string()),
            country: Some("Taiwan".to_string()),
            ..Default::default()
        };
        let prompt = system_prompt(&hints);
        assert!(prompt.contains("Kaohsiung, Taiwan"));
        assert!(!system_prompt(&RequestHints::default()).contains("located near"));
    }
}
