//! Common types for metrics definitions, plus the transport's own metrics.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Gauge => "Gauge",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

pub const REQUESTS_SENT: MetricDef = MetricDef {
    name: "transport.requests.sent",
    metric_type: MetricType::Counter,
    description: "Number of HTTP requests issued to the backend",
};

pub const REQUEST_RETRIES: MetricDef = MetricDef {
    name: "transport.requests.retries",
    metric_type: MetricType::Counter,
    description: "Number of retries triggered by retriable HTTP statuses",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "transport.requests.rejected",
    metric_type: MetricType::Counter,
    description: "Number of non-2xx responses surfaced to the caller",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS_SENT, REQUEST_RETRIES, REQUESTS_REJECTED];
