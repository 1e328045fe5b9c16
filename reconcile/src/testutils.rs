//! Test doubles shared by the crate's tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use transport::error::ErrorEnvelope;
use transport::{ApiRequest, ApiTransport, RawResponse, TransportError};

/// An [`ApiTransport`] that replays a scripted sequence of responses and
/// records every request it receives, in order.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a 200 response with the given JSON body.
    pub fn push_ok(&self, body: Value) {
        self.script.lock().unwrap().push_back(Ok(RawResponse {
            status: ::http::StatusCode::OK,
            body,
        }));
    }

    /// Queues a rejection carrying the backend's error envelope.
    pub fn push_rejected(&self, status: u16, error_code: &str, message: &str) {
        let envelope = ErrorEnvelope {
            error_code: Some(error_code.to_string()),
            error_description: Some(message.to_string()),
            error_msg: None,
        };
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Rejected {
                method: ::http::Method::GET,
                path: "/".to_string(),
                status: ::http::StatusCode::from_u16(status)
                    .unwrap_or(::http::StatusCode::INTERNAL_SERVER_ERROR),
                envelope,
            }));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn request(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of responses")
    }
}
