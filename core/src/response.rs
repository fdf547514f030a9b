//! Responses produced by the racks.

use crate::error::{Error, ErrorEnvelope};
use crate::headers::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response from a rack: status code, headers, and body data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP-style status code
    pub status_code: u16,
    /// Response headers
    #[serde(default)]
    pub headers: HeaderMap,
    /// Body data
    #[serde(default)]
    pub data: Value,
}

impl Response {
    /// Create a response.
    pub fn new(status_code: u16, headers: HeaderMap, data: Value) -> Self {
        Self {
            status_code,
            headers,
            data,
        }
    }

    /// A success response with the given body and no headers.
    pub fn ok(data: Value) -> Self {
        Self::new(200, HeaderMap::new(), data)
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Normalize the body to a vector of entities: an array yields its
    /// items, `null` yields nothing, anything else yields itself.
    pub fn entities(&self) -> Vec<Value> {
        match &self.data {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Lift a failed response's error envelope into a typed error.
    ///
    /// `EntityNotFound` and `BlobNotFound` envelopes map to their dedicated
    /// kinds; everything else becomes a generic API error.
    pub fn into_error(self) -> Error {
        let envelope = ErrorEnvelope::from_value(&self.data);
        let message = envelope.best_message().to_string();

        match envelope.name.as_deref() {
            Some("BlobNotFound") => Error::BlobNotFound(message),
            Some("EntityNotFound") => Error::NotFound(message),
            _ => Error::Api {
                name: envelope.name,
                status_code: self.status_code,
                message,
                debug: envelope.debug,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_range() {
        assert!(Response::ok(Value::Null).is_success());
        assert!(Response::new(201, HeaderMap::new(), Value::Null).is_success());
        assert!(Response::new(299, HeaderMap::new(), Value::Null).is_success());
        assert!(!Response::new(199, HeaderMap::new(), Value::Null).is_success());
        assert!(!Response::new(300, HeaderMap::new(), Value::Null).is_success());
        assert!(!Response::new(404, HeaderMap::new(), Value::Null).is_success());
    }

    #[test]
    fn entities_normalization() {
        let array = Response::ok(json!([{"_id": "a"}, {"_id": "b"}]));
        assert_eq!(array.entities().len(), 2);

        let object = Response::ok(json!({"_id": "a"}));
        assert_eq!(object.entities(), vec![json!({"_id": "a"})]);

        let null = Response::ok(Value::Null);
        assert!(null.entities().is_empty());
    }

    #[test]
    fn entity_not_found_envelope_lifts() {
        let response = Response::new(
            404,
            HeaderMap::new(),
            json!({"name": "EntityNotFound", "description": "missing"}),
        );
        assert!(matches!(response.into_error(), Error::NotFound(m) if m == "missing"));
    }

    #[test]
    fn blob_not_found_envelope_lifts() {
        let response = Response::new(
            404,
            HeaderMap::new(),
            json!({"name": "BlobNotFound", "message": "no blob"}),
        );
        assert!(matches!(response.into_error(), Error::BlobNotFound(m) if m == "no blob"));
    }

    #[test]
    fn generic_envelope_becomes_api_error() {
        let response = Response::new(
            500,
            HeaderMap::new(),
            json!({"name": "KinveyInternalErrorRetry", "message": "retry", "debug": "stack"}),
        );
        match response.into_error() {
            Error::Api {
                name,
                status_code,
                message,
                debug,
            } => {
                assert_eq!(name.as_deref(), Some("KinveyInternalErrorRetry"));
                assert_eq!(status_code, 500);
                assert_eq!(message, "retry");
                assert_eq!(debug.as_deref(), Some("stack"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn envelope_free_body_becomes_api_error() {
        let response = Response::new(503, HeaderMap::new(), json!("service unavailable"));
        match response.into_error() {
            Error::Api {
                name, status_code, ..
            } => {
                assert_eq!(name, None);
                assert_eq!(status_code, 503);
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }
}
