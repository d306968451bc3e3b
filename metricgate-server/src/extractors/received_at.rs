use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// The time at which the request headers were received.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedAt(SystemTime);

impl ReceivedAt {
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    /// Returns the receive time as Unix timestamp in seconds.
    pub fn unix_timestamp(self) -> i64 {
        self.0
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for ReceivedAt
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::now())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_unix_timestamp() {
        let received = ReceivedAt(UNIX_EPOCH + Duration::from_millis(1_700_000_000_999));
        assert_eq!(received.unix_timestamp(), 1_700_000_000);
    }
}
