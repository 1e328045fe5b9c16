//! Narrow HTTP boundary between the reconciliation core and the backend.
//!
//! The core only ever talks to the backend through the [`ApiTransport`]
//! trait: one request in, one structured response out. Everything the
//! backend does badly (inconsistent status codes, error codes buried in
//! 200 bodies) is surfaced here as data and classified by the callers,
//! not hidden by the transport.

pub mod error;
pub mod http;
pub mod metrics_defs;

pub use error::{ErrorEnvelope, TransportError};
pub use http::{HttpTransport, HttpTransportConfig};

use ::http::{Method, StatusCode};
use async_trait::async_trait;
use serde_json::Value;

/// A single request against the backend REST surface.
///
/// Query parameters are kept as ordered pairs rather than a map because
/// list-valued fields are expanded into repeated keys and the backend is
/// sensitive to their order.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, e.g. `/v5/hosts`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn with_query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A decoded backend response.
///
/// Only successful (2xx) responses are returned as `RawResponse`; anything
/// else becomes a [`TransportError`]. A 2xx response is *not* proof the
/// operation took effect -- several mutating endpoints return 200
/// unconditionally, so callers confirm through reads.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Value::Null` when the response body was empty.
    pub body: Value,
}

impl RawResponse {
    pub fn has_body(&self) -> bool {
        !self.body.is_null()
    }
}

/// The single seam the reconciliation core uses to reach the backend.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::get("/v5/hosts")
            .with_query_pair("limit", "200")
            .with_query_pair("offset", "0")
            .with_header("X-Request-Id", "abc");

        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/v5/hosts");
        assert_eq!(req.query.len(), 2);
        assert_eq!(req.query[0], ("limit".to_string(), "200".to_string()));
        assert!(req.body.is_none());
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_request_with_body() {
        let req = ApiRequest::post("/v5/hosts/protection")
            .with_body(serde_json::json!({"host_id": "h-1", "enable": true}));

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body.unwrap()["host_id"], "h-1");
    }

    #[test]
    fn test_raw_response_body_presence() {
        let empty = RawResponse {
            status: StatusCode::OK,
            body: Value::Null,
        };
        assert!(!empty.has_body());

        let full = RawResponse {
            status: StatusCode::OK,
            body: serde_json::json!({"data_list": []}),
        };
        assert!(full.has_body());
    }
}
