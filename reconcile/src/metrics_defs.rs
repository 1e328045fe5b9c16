//! Metrics definitions for the reconciliation core.

use transport::metrics_defs::{MetricDef, MetricType};

pub const FETCH_PAGES: MetricDef = MetricDef {
    name: "reconcile.fetch.pages",
    metric_type: MetricType::Counter,
    description: "Number of list pages fetched from the backend",
};

pub const FETCH_RECORDS: MetricDef = MetricDef {
    name: "reconcile.fetch.records",
    metric_type: MetricType::Histogram,
    description: "Number of records accumulated per completed fetch",
};

pub const POLL_TICKS: MetricDef = MetricDef {
    name: "reconcile.poll.ticks",
    metric_type: MetricType::Counter,
    description: "Number of status refreshes performed while converging",
};

pub const CONVERGENCE_SECONDS: MetricDef = MetricDef {
    name: "reconcile.poll.duration",
    metric_type: MetricType::Histogram,
    description: "Wall-clock seconds until a resource converged",
};

pub const ALL_METRICS: &[MetricDef] = &[
    FETCH_PAGES,
    FETCH_RECORDS,
    POLL_TICKS,
    CONVERGENCE_SECONDS,
];
