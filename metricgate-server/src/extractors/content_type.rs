use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

/// The verbatim `Content-Type` header, or an empty string if absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawContentType(String);

impl RawContentType {
    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RawContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for RawContentType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RawContentType
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let mime = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();

        Ok(Self(mime))
    }
}

/// Whether the body is declared as zlib compressed via `Content-Encoding: deflate`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deflate(pub bool);

impl<S> FromRequestParts<S> for Deflate
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let deflate = parts
            .headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("deflate"));

        Ok(Self(deflate))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract<T>(request: Request<()>) -> T
    where
        T: FromRequestParts<(), Rejection = Infallible>,
    {
        let (mut parts, _) = request.into_parts();
        match T::from_request_parts(&mut parts, &()).await {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn test_raw_content_type() {
        let request = Request::builder()
            .header("content-type", "rt-metric-binary")
            .body(())
            .unwrap();
        let content_type: RawContentType = extract(request).await;
        assert_eq!(content_type.as_ref(), "rt-metric-binary");

        let content_type: RawContentType = extract(Request::new(())).await;
        assert!(content_type.is_empty());
    }

    #[tokio::test]
    async fn test_deflate() {
        let request = Request::builder()
            .header("content-encoding", "deflate")
            .body(())
            .unwrap();
        assert_eq!(extract::<Deflate>(request).await, Deflate(true));

        let request = Request::builder()
            .header("content-encoding", "gzip")
            .body(())
            .unwrap();
        assert_eq!(extract::<Deflate>(request).await, Deflate(false));

        assert_eq!(extract::<Deflate>(Request::new(())).await, Deflate(false));
    }
}
