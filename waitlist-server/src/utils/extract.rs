//! Request extractors that fail with the unified error envelope

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use shared::error::{AppError, AppResult, ErrorCode};
use std::convert::Infallible;

pub const ACTOR_HEADER: &str = "x-actor";
pub const ANONYMOUS_ACTOR: &str = "anonymous";
const MAX_ACTOR_LEN: usize = 64;

/// Who performed the request, from the `X-Actor` header
///
/// Missing, blank, non-UTF-8 or overlong values fall back to `anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.chars().count() <= MAX_ACTOR_LEN)
            .unwrap_or(ANONYMOUS_ACTOR);
        Ok(Actor(actor.to_string()))
    }
}

/// Parse a JSON body; malformed input is an `InvalidFormat` error
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        AppError::with_message(ErrorCode::InvalidFormat, format!("Invalid JSON body: {e}"))
    })
}

/// Parse an optional JSON body; an empty body is `None`
pub fn parse_optional_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    parse_json(body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn actor_of(header: Option<&str>) -> String {
        let mut builder = Request::builder();
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_actor_header() {
        assert_eq!(actor_of(Some("host-1")).await, "host-1");
        assert_eq!(actor_of(Some("  ")).await, ANONYMOUS_ACTOR);
        assert_eq!(actor_of(None).await, ANONYMOUS_ACTOR);
        assert_eq!(actor_of(Some(&"x".repeat(65))).await, ANONYMOUS_ACTOR);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Body {
        value: u32,
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json::<Body>(br#"{"value": 3}"#).unwrap().value, 3);
        let err = parse_json::<Body>(b"{").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        assert!(parse_optional_json::<Body>(b"").unwrap().is_none());
        assert!(parse_optional_json::<Body>(b"  \n").unwrap().is_none());
        assert!(parse_optional_json::<Body>(br#"{"value": 1}"#).unwrap().is_some());
    }
}
