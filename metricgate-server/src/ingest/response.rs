use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metricgate_metrics::InvalidMetric;
use serde::Serialize;

/// A rejected record, identified by its position in the decoded input.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InvalidEntry {
    /// Index of the record in the decoded input.
    pub index: usize,
    /// The validation failure.
    pub reason: &'static str,
}

/// Outcome of a publishing ingestion request.
///
/// Returned with `200 OK` even if every record was rejected.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsResponse {
    /// Number of records handed to the publisher.
    pub published: usize,
    /// Rejected records in input order.
    pub invalid: Vec<InvalidEntry>,
}

impl MetricsResponse {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rejection of the record at `index`.
    pub fn add_invalid(&mut self, index: usize, reason: InvalidMetric) {
        self.invalid.push(InvalidEntry {
            index,
            reason: reason.name(),
        });
    }
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        let mut response = MetricsResponse::new();
        response.add_invalid(1, InvalidMetric::NameEmpty);
        response.published = 2;

        insta::assert_json_snapshot!(response, @r###"
        {
          "published": 2,
          "invalid": [
            {
              "index": 1,
              "reason": "name cannot be empty"
            }
          ]
        }
        "###);
    }
}
