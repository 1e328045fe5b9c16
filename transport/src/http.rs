//! Production [`ApiTransport`] backed by reqwest.
//!
//! Retriable HTTP statuses (429 and the 5xx gateway family) are retried
//! here with bounded exponential backoff; every other failure is surfaced
//! immediately. The reconciliation core never retries on its own.

use crate::counter;
use crate::error::{ErrorEnvelope, TransportError};
use crate::metrics_defs::{REQUESTS_REJECTED, REQUESTS_SENT, REQUEST_RETRIES};
use crate::{ApiRequest, ApiTransport, RawResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::{Duration, sleep};
use url::Url;

const BASE_DELAY_MILLIS: u64 = 500;

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Base URL of the backend, e.g. `https://hss.example.com`.
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Retries per request for retriable statuses.
    pub max_retries: u32,
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTransportConfig {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(HttpTransport {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn build_url(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let full = format!("{}{}", self.base_url, request.path);
        let mut url =
            Url::parse(&full).map_err(|e| TransportError::InvalidUrl(format!("{full}: {e}")))?;

        for (key, value) in &request.query {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.build_url(&request)?;
        let mut retries = 0;

        loop {
            let mut builder = self.client.request(request.method.clone(), url.clone());

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            counter!(REQUESTS_SENT).increment(1);
            let response = builder.send().await?;
            let status = response.status();

            if !status.is_success() {
                if RETRIABLE_STATUS_CODES.contains(&status) {
                    if retries < self.max_retries {
                        let retry_millis = BASE_DELAY_MILLIS * 2_u64.pow(retries);
                        tracing::debug!(
                            path = %request.path,
                            status = %status,
                            retry_millis,
                            "Retriable status from backend, backing off"
                        );
                        counter!(REQUEST_RETRIES).increment(1);
                        sleep(Duration::from_millis(retry_millis)).await;
                        retries += 1;
                        continue;
                    }
                    return Err(TransportError::RetriesExhausted {
                        path: request.path.clone(),
                        attempts: retries + 1,
                        status,
                    });
                }

                // Terminal rejection: the envelope, not the status code, is
                // what upper layers classify on.
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                let envelope = ErrorEnvelope::from_body(&body);
                counter!(REQUESTS_REJECTED).increment(1);
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    status = %status,
                    %envelope,
                    "Backend rejected request"
                );
                return Err(TransportError::Rejected {
                    method: request.method.clone(),
                    path: request.path.clone(),
                    status,
                    envelope,
                });
            }

            let text = response.text().await?;
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| TransportError::InvalidBody {
                    path: request.path.clone(),
                    detail: e.to_string(),
                })?
            };

            return Ok(RawResponse { status, body });
        }
    }
}
