//! Minimal HTTP client used to hand records to downstream collaborators.

use std::time::Duration;

#[doc(inline)]
pub use reqwest::StatusCode;
use serde::Serialize;

use crate::constants;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("could not send request: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("upstream responded with {0}")]
    Status(StatusCode),
}

impl HttpError {
    /// Returns `true` if the error indicates a network failure rather than a rejection.
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Reqwest(error) => error.is_timeout() || error.is_connect(),
            Self::Status(_) => false,
        }
    }
}

/// A downstream endpoint accepting JSON payloads via `POST`.
#[derive(Clone, Debug)]
pub struct HttpTarget {
    client: reqwest::Client,
    url: String,
}

impl HttpTarget {
    /// Creates a client for the given URL with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(constants::SERVER)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the payload as JSON and fails on any non-success status.
    pub async fn post_json<T>(&self, payload: &T) -> Result<(), HttpError>
    where
        T: Serialize + ?Sized,
    {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let error = HttpError::Status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.to_string(), "upstream responded with 503 Service Unavailable");
        assert!(!error.is_network_error());
    }
}
