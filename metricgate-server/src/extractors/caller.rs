use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::{self, HeaderValue};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use data_encoding::BASE64;
use metricgate_statsd::metric;

use crate::service::ServiceState;
use crate::services::auth::{AuthError, Caller};
use crate::statsd::ServerCounters;

/// Username used for callers authenticating with a bearer token.
const BEARER_USERNAME: &str = "api_key";

/// Rejection for the [`Caller`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum CallerError {
    /// The request carries no usable `Authorization` header.
    #[error("missing authorization information")]
    Missing,
    /// The credentials were rejected by the auth plugin.
    #[error(transparent)]
    Invalid(#[from] AuthError),
}

impl CallerError {
    fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Invalid(_) => "invalid",
        }
    }
}

impl IntoResponse for CallerError {
    fn into_response(self) -> Response {
        metric!(counter(ServerCounters::AuthFailed) += 1, reason = self.reason());
        (StatusCode::UNAUTHORIZED, Json(self.to_string())).into_response()
    }
}

/// Splits an `Authorization` header into username and key.
///
/// Supports `Basic` credentials and `Bearer` tokens. Returns `None` for any other scheme or a
/// malformed value.
fn parse_authorization(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?.trim();
    let (scheme, credentials) = value.split_once(' ')?;
    let credentials = credentials.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        if credentials.is_empty() {
            return None;
        }
        return Some((BEARER_USERNAME.to_owned(), credentials.to_owned()));
    }

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = BASE64.decode(credentials.as_bytes()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, key) = decoded.split_once(':')?;
        return Some((username.to_owned(), key.to_owned()));
    }

    None
}

impl FromRequestParts<ServiceState> for Caller {
    type Rejection = CallerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let (username, key) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(parse_authorization)
            .ok_or(CallerError::Missing)?;

        let caller = state.auth().authenticate(&username, &key)?;
        Ok(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &'static str) -> Option<(String, String)> {
        parse_authorization(&HeaderValue::from_static(value))
    }

    #[test]
    fn test_parse_basic() {
        let encoded = BASE64.encode(b"api_key:secret");
        let value = HeaderValue::from_str(&format!("Basic {encoded}")).unwrap();
        assert_eq!(
            parse_authorization(&value),
            Some(("api_key".to_owned(), "secret".to_owned()))
        );
    }

    #[test]
    fn test_parse_basic_key_with_colon() {
        let encoded = BASE64.encode(b"user:a:b");
        let value = HeaderValue::from_str(&format!("basic {encoded}")).unwrap();
        assert_eq!(
            parse_authorization(&value),
            Some(("user".to_owned(), "a:b".to_owned()))
        );
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(
            parse("Bearer secret"),
            Some(("api_key".to_owned(), "secret".to_owned()))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse("Bearer "), None);
        assert_eq!(parse("Basic not-base64!"), None);
        assert_eq!(parse("Digest foo"), None);
        assert_eq!(parse("secret"), None);
    }
}
