//! Auth collaborator: resolves a request to a user identity and tier.

use std::collections::HashMap;

use axum::http::HeaderMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Guest,
    Regular,
}

impl UserType {
    /// Messages a user may send inside the rolling rate-limit window.
    pub fn daily_message_limit(&self) -> usize {
        match self {
            Self::Guest => 20,
            Self::Regular => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub user_type: UserType,
}

pub trait AuthService: Send + Sync {
    /// `None` means unauthenticated; the caller maps that to a 401.
    fn authenticate(&self, headers: &HeaderMap) -> Option<AuthSession>;
}

/// Bearer tokens for registered users, `x-guest-id` for anonymous sessions.
pub struct StaticTokenAuth {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Parses `AUTH_TOKENS` in `token:user,token:user` form. Malformed
    /// entries are skipped with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let raw = std::env::var("AUTH_TOKENS").unwrap_or_default();
        let mut tokens = HashMap::new();
        for entry in raw.split(',').filter(|entry| !entry.is_empty()) {
            match entry.split_once(':') {
                Some((token, user)) if !token.is_empty() && !user.is_empty() => {
                    tokens.insert(token.to_string(), user.to_string());
                }
                _ => tracing::warn!(entry, "ignoring malformed AUTH_TOKENS entry"),
            }
        }
        Self { tokens }
    }
}

impl AuthService for StaticTokenAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Option<AuthSession> {
        if let Some(token) = bearer_token(headers) {
            let user_id = self.tokens.get(token)?.clone();
            return Some(AuthSession {
                user_id,
                user_type: UserType::Regular,
            });
        }

        let guest_id = headers.get("x-guest-id")?.to_str().ok()?;
        if guest_id.is_empty() {
            return None;
        }
        Some(AuthSession {
            user_id: guest_id.to_string(),
            user_type: UserType::Guest,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth() -> StaticTokenAuth {
        let mut tokens = HashMap::new();
        tokens.insert("tok-1".to_string(), "alice".to_string());
        StaticTokenAuth::new(tokens)
    }

    #[test]
    fn bearer_token_resolves_registered_user() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok-1"),
        );
        let session = auth().authenticate(&headers).unwrap();
        assert_eq!(session.user_id, "alice");
        assert_eq!(session.user_type, UserType::Regular);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer nope"),
        );
        assert!(auth().authenticate(&headers).is_none());
    }

    #[test]
    fn guest_header_yields_guest_tier() {
        let mut headers = HeaderMap::new();
        headers.insert("x-guest-id", HeaderValue::from_static("g-42"));
        let session = auth().authenticate(&headers).unwrap();
        assert_eq!(session.user_id, "g-42");
        assert_eq!(session.user_type, UserType::Guest);
    }

    #[test]
    fn missing_credentials_are_unauthenticated() {
        assert!(auth().authenticate(&HeaderMap::new()).is_none());
    }

    #[test]
    fn guest_limit_is_below_regular_limit() {
        assert!(UserType::Guest.daily_message_limit() < UserType::Regular.daily_message_limit());
    }
}
