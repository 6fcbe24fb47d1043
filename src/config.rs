use serde::{Deserialize, Serialize};
use std::env;

use crate::types::StructuredPayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub host: String,
    pub port: u16,

    // Completion model collaborator
    pub model_endpoint: Option<String>,
    pub model_api_key: Option<String>,
    pub model_name: String,

    // Analytics event context
    pub environment: String,
    pub public_origin: String,
    pub analytics_buffer: usize,

    // Rate limiting
    pub rate_limit_window_hours: i64,

    // When set, the completion side-channel persists this payload instead of
    // the model output. Reproduces the demo card without hard-coding it.
    pub completion_override: Option<StructuredPayload>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let completion_override = match env::var("COMPLETION_OVERRIDE") {
            Ok(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("COMPLETION_OVERRIDE is not a valid structured payload: {e}")
            })?),
            Err(_) => None,
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,

            model_endpoint: env::var("MODEL_ENDPOINT").ok(),
            model_api_key: env::var("MODEL_API_KEY").ok(),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),

            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            public_origin: env::var("PUBLIC_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            analytics_buffer: 256,

            rate_limit_window_hours: 24,

            completion_override,
        })
    }
}
