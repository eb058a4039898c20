//! JSON response construction.
//!
//! Every broker API response is a small JSON document, so the body type is
//! a plain buffered [`Full`]. Errors use the protocol's
//! `{"description": ...}` envelope.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::error;

/// Buffered JSON response body used by the broker service.
pub type BrokerBody = Full<Bytes>;

/// A response carrying a serialized JSON value.
pub fn json_response<T: serde::Serialize>(
    status: StatusCode,
    value: &T,
) -> http::Response<BrokerBody> {
    match serde_json::to_vec(value) {
        Ok(body) => build(status, Bytes::from(body)),
        Err(err) => {
            error!(error = %err, "failed to serialize response body");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to serialize response",
            )
        }
    }
}

/// A response whose body is the empty JSON object.
pub fn empty_object_response(status: StatusCode) -> http::Response<BrokerBody> {
    build(status, Bytes::from_static(b"{}"))
}

/// An error response in the protocol's `{"description": ...}` envelope.
pub fn error_response(status: StatusCode, description: &str) -> http::Response<BrokerBody> {
    let body = serde_json::json!({ "description": description }).to_string();
    build(status, Bytes::from(body))
}

fn build(status: StatusCode, body: Bytes) -> http::Response<BrokerBody> {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(body))
        .expect("response with static parts should be valid")
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: http::Response<BrokerBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_should_wrap_errors_in_description_envelope() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json"),
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"description": "bad input"})
        );
    }

    #[tokio::test]
    async fn test_should_serialize_json_values() {
        let response = json_response(StatusCode::CREATED, &serde_json::json!({"a": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_should_produce_empty_object_body() {
        let response = empty_object_response(StatusCode::GONE);
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(body_json(response).await, serde_json::json!({}));
    }
}
