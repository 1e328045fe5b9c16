use http::{Method, StatusCode};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Substrings that mark an `error_code` as a not-found condition across the
/// backend's endpoint families. Exact per-resource codes can be added on top
/// via [`ErrorEnvelope::is_not_found`].
const NOT_FOUND_MARKERS: &[&str] = &["not_found", "notfound", "not_exist", "notexist", "no_such"];

/// Structured error body carried by the backend.
///
/// The backend does not use HTTP status codes consistently (a 400 body may
/// describe a missing resource), so the envelope is what callers pattern
/// match on. All fields are optional because error bodies are inconsistent
/// too; some endpoints nest the whole thing under an `error` key.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl ErrorEnvelope {
    /// Extracts the envelope from a response body, tolerating both flat and
    /// `{"error": {...}}`-nested shapes. An unrecognizable body yields an
    /// empty envelope rather than an error; the HTTP status still carries
    /// the failure.
    pub fn from_body(body: &serde_json::Value) -> Self {
        let flat: ErrorEnvelope = serde_json::from_value(body.clone()).unwrap_or_default();
        if !flat.is_empty() {
            return flat;
        }
        if let Some(inner) = body.get("error") {
            return serde_json::from_value(inner.clone()).unwrap_or_default();
        }
        ErrorEnvelope::default()
    }

    pub fn is_empty(&self) -> bool {
        self.error_code.is_none() && self.error_description.is_none() && self.error_msg.is_none()
    }

    /// The human-readable message, preferring `error_description` over the
    /// older `error_msg` key.
    pub fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.error_msg.as_deref())
    }

    /// Whether the envelope describes a missing resource.
    ///
    /// `extra_codes` are exact per-resource codes supplied by the caller;
    /// on top of those a set of generic markers is matched as substrings of
    /// the code, case-insensitively.
    pub fn is_not_found(&self, extra_codes: &[String]) -> bool {
        let Some(code) = self.error_code.as_deref() else {
            return false;
        };
        if extra_codes.iter().any(|c| c == code) {
            return true;
        }
        let lower = code.to_ascii_lowercase();
        NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m))
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.error_code.as_deref(), self.message()) {
            (Some(code), Some(msg)) => write!(f, "error_code={code}: {msg}"),
            (Some(code), None) => write!(f, "error_code={code}"),
            (None, Some(msg)) => write!(f, "{msg}"),
            (None, None) => write!(f, "no error details in body"),
        }
    }
}

/// Errors from the HTTP boundary. All of these are fatal to the operation
/// that issued the request; classification into recoverable conditions
/// (not-found remaps) happens in the orchestration layer above.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("backend rejected {method} {path}: HTTP {status}, {envelope}")]
    Rejected {
        method: Method,
        path: String,
        status: StatusCode,
        envelope: ErrorEnvelope,
    },

    #[error("backend unavailable for {path}: gave up after {attempts} attempts (last status {status})")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        status: StatusCode,
    },

    #[error("response body for {path} was not valid JSON: {detail}")]
    InvalidBody { path: String, detail: String },
}

impl TransportError {
    /// Returns the rejection envelope when the backend answered with a
    /// structured error body.
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            TransportError::Rejected { envelope, .. } => Some(envelope),
            _ => None,
        }
    }
}
