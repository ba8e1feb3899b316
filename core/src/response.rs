//! Classification of raw response text.
//!
//! # Design
//! [`classify`] is pure: it returns either an [`Envelope`] or an error and
//! never touches client state. The client applies the session and pagination
//! facets only after classification succeeded, so a failed call leaves the
//! previous state intact.
//!
//! The HTTP status plays no part; the server signals failure in the body.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Prefix the server puts on validation failures.
pub const DATA_ERROR_PREFIX: &str = "Data Error: ";

/// Record and page totals reported alongside a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(alias = "records")]
    pub total_records: u64,
    #[serde(alias = "pages")]
    pub total_pages: u64,
}

/// Facets of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The `response` payload; `Null` when absent.
    pub response: Value,
    /// `request.session`, if the server sent one.
    pub session: Option<Value>,
    pub pagination: Option<Pagination>,
}

/// Parse `text` and sort it into a success envelope or a typed error.
pub fn classify(text: &str) -> Result<Envelope, ApiError> {
    let mut doc: Value = serde_json::from_str(text).map_err(|e| ApiError::malformed(&e, text))?;

    if let Some(err) = error_in(&doc) {
        return Err(err);
    }
    if let Some(err) = doc.get("response").and_then(error_in) {
        return Err(err);
    }

    let session = doc
        .pointer("/request/session")
        .filter(|v| !v.is_null())
        .cloned();
    let pagination = doc
        .get("pagination")
        .and_then(|p| Pagination::deserialize(p).ok());
    let response = doc
        .get_mut("response")
        .map(Value::take)
        .unwrap_or(Value::Null);

    Ok(Envelope {
        response,
        session,
        pagination,
    })
}

/// The error carried by `obj`, if its `error` member is set.
fn error_in(obj: &Value) -> Option<ApiError> {
    let error = obj.get("error").filter(|v| !v.is_null())?;

    if let Some(secs) = obj.get("retry_after").and_then(retry_seconds) {
        return Some(ApiError::RateLimited {
            retry_after: secs,
        });
    }

    let message = match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(match message.strip_prefix(DATA_ERROR_PREFIX) {
        Some(rest) => ApiError::DataValidation(rest.to_string()),
        None => ApiError::Remote(message),
    })
}

fn retry_seconds(value: &Value) -> Option<Duration> {
    if let Some(secs) = value.as_u64() {
        return Some(Duration::from_secs(secs));
    }
    value
        .as_f64()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn top_level_error_is_remote() {
        let err = classify(r#"{"error":"boom"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref m) if m == "boom"));
    }

    #[test]
    fn nested_data_error_strips_prefix() {
        let err = classify(r#"{"response":{"error":"Data Error: dup key"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::DataValidation(ref m) if m == "dup key"));
    }

    #[test]
    fn data_prefix_is_case_sensitive_and_anchored() {
        let err = classify(r#"{"error":"data error: dup key"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref m) if m == "data error: dup key"));

        let err = classify(r#"{"error":"Fatal Data Error: x"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = classify("<html>502</html>").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { ref plaintext, .. } if plaintext == "<html>502</html>"));
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(classify("").unwrap_err(), ApiError::MalformedResponse { .. }));
    }

    #[test]
    fn null_error_member_is_not_an_error() {
        let env = classify(r#"{"error":null,"response":[1]}"#).unwrap();
        assert_eq!(env.response, json!([1]));
    }

    #[test]
    fn non_string_error_is_rendered_as_json() {
        let err = classify(r#"{"error":{"code":7}}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote(ref m) if m == r#"{"code":7}"#));
    }

    #[test]
    fn retry_after_marks_rate_limit() {
        let err = classify(r#"{"error":"slow down","retry_after":15}"#).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(15)));

        let err = classify(r#"{"response":{"error":"slow down","retry_after":2.5}}"#).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn success_extracts_facets() {
        let env = classify(
            r#"{"response":[{"id":1}],"request":{"session":{"user":"a"}},"pagination":{"total_records":12,"total_pages":3}}"#,
        )
        .unwrap();
        assert_eq!(env.response, json!([{"id": 1}]));
        assert_eq!(env.session, Some(json!({"user": "a"})));
        assert_eq!(
            env.pagination,
            Some(Pagination {
                total_records: 12,
                total_pages: 3
            })
        );
    }

    #[test]
    fn pagination_aliases_are_accepted() {
        let env = classify(r#"{"response":[],"pagination":{"records":4,"pages":1}}"#).unwrap();
        assert_eq!(env.pagination.map(|p| p.total_pages), Some(1));
    }

    #[test]
    fn missing_response_is_null() {
        let env = classify(r#"{"request":{}}"#).unwrap();
        assert_eq!(env.response, Value::Null);
        assert_eq!(env.session, None);
        assert_eq!(env.pagination, None);
    }
}
