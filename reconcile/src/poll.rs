//! Convergence polling: repeatedly refresh a resource until it reaches a
//! target status, hits a failure status, or runs out of time.
//!
//! The two unhappy endings are deliberately different errors. A timeout
//! means the backend was still working when the budget ran out and the
//! resource may yet converge; a failure status means the backend gave up
//! and retrying without intervention is pointless.

use crate::document::Record;
use crate::errors::ReconcileError;
use crate::metrics_defs::{CONVERGENCE_SECONDS, POLL_TICKS};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use transport::{counter, histogram};

/// One status observation of the polled resource.
#[derive(Clone, Debug)]
pub enum Probe {
    /// The resource exists and reports `status`.
    Observed { status: String, payload: Record },
    /// The resource could not be found at all.
    Gone,
}

/// How to interpret a [`Probe::Gone`] observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbsenceRule {
    /// Disappearance is the goal (delete operations).
    Success,
    /// Disappearance means the resource was lost mid-flight.
    Failure,
}

/// What "converged" means for one operation.
#[derive(Clone, Debug)]
pub struct WaitSpec {
    pub operation: String,
    pub pending: HashSet<String>,
    pub target: HashSet<String>,
    pub failure: HashSet<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub initial_delay: Duration,
    pub absence: AbsenceRule,
}

impl WaitSpec {
    pub fn new(operation: impl Into<String>) -> Self {
        WaitSpec {
            operation: operation.into(),
            pending: HashSet::new(),
            target: HashSet::new(),
            failure: HashSet::new(),
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(10),
            initial_delay: Duration::ZERO,
            absence: AbsenceRule::Failure,
        }
    }

    pub fn pending<I: IntoIterator<Item = S>, S: Into<String>>(mut self, statuses: I) -> Self {
        self.pending = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn target<I: IntoIterator<Item = S>, S: Into<String>>(mut self, statuses: I) -> Self {
        self.target = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure<I: IntoIterator<Item = S>, S: Into<String>>(mut self, statuses: I) -> Self {
        self.failure = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn absence(mut self, rule: AbsenceRule) -> Self {
        self.absence = rule;
        self
    }
}

/// Polls `refresh` until the spec's target is reached.
///
/// Returns the converged resource's payload, or `None` when convergence
/// was observed as absence under [`AbsenceRule::Success`]. Statuses in
/// none of the three sets are logged and treated as still pending.
pub async fn await_convergence<F, Fut>(
    spec: &WaitSpec,
    mut refresh: F,
) -> Result<Option<Record>, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe, ReconcileError>>,
{
    let started = Instant::now();
    let deadline = started + spec.timeout;

    if !spec.initial_delay.is_zero() {
        tokio::time::sleep(spec.initial_delay).await;
    }

    loop {
        counter!(POLL_TICKS).increment(1);

        match refresh().await? {
            Probe::Gone => match spec.absence {
                AbsenceRule::Success => {
                    histogram!(CONVERGENCE_SECONDS).record(started.elapsed().as_secs_f64());
                    tracing::debug!(operation = %spec.operation, "resource gone, treated as converged");
                    return Ok(None);
                }
                AbsenceRule::Failure => {
                    return Err(ReconcileError::ConvergenceFailed {
                        operation: spec.operation.clone(),
                        reason: "resource disappeared before reaching the target status".into(),
                    });
                }
            },
            Probe::Observed { status, payload } => {
                if spec.target.contains(&status) {
                    histogram!(CONVERGENCE_SECONDS).record(started.elapsed().as_secs_f64());
                    tracing::debug!(
                        operation = %spec.operation,
                        status,
                        elapsed_secs = started.elapsed().as_secs(),
                        "converged"
                    );
                    return Ok(Some(payload));
                }
                if spec.failure.contains(&status) {
                    return Err(ReconcileError::ConvergenceFailed {
                        operation: spec.operation.clone(),
                        reason: status,
                    });
                }
                if !spec.pending.contains(&status) {
                    tracing::warn!(
                        operation = %spec.operation,
                        status,
                        "unrecognized status, still waiting"
                    );
                }
            }
        }

        // Give up now if the next refresh could not happen inside the
        // budget; a sleep that outlives the deadline buys nothing.
        if Instant::now() + spec.poll_interval > deadline {
            return Err(ReconcileError::ConvergenceTimeout {
                operation: spec.operation.clone(),
                waited_secs: spec.timeout.as_secs(),
            });
        }
        tokio::time::sleep(spec.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn observed(status: &str) -> Probe {
        Probe::Observed {
            status: status.to_string(),
            payload: Record::from_value(json!({"protect_status": status})).unwrap(),
        }
    }

    fn scripted(
        probes: Vec<Probe>,
    ) -> impl FnMut() -> std::future::Ready<Result<Probe, ReconcileError>> {
        let script = Mutex::new(VecDeque::from(probes));
        move || {
            let probe = script
                .lock()
                .unwrap()
                .pop_front()
                .expect("poller refreshed more often than scripted");
            std::future::ready(Ok(probe))
        }
    }

    fn protect_spec() -> WaitSpec {
        WaitSpec::new("create host_protection")
            .pending(["opening", "upgrading"])
            .target(["opened", "protected"])
            .failure(["error_protect"])
            .timeout(Duration::from_secs(120))
            .poll_interval(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_pending_observations() {
        let refresh = scripted(vec![
            observed("opening"),
            observed("opening"),
            observed("protected"),
        ]);

        let record = await_convergence(&protect_spec(), refresh)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.get_str("protect_status"), Some("protected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_interval_refreshes_once() {
        let spec = protect_spec()
            .timeout(Duration::from_secs(5))
            .poll_interval(Duration::from_secs(10));
        // One probe scripted; a second refresh would panic the script.
        let refresh = scripted(vec![observed("opening")]);

        let err = await_convergence(&spec, refresh).await.unwrap_err();
        match err {
            ReconcileError::ConvergenceTimeout {
                operation,
                waited_secs,
            } => {
                assert_eq!(operation, "create host_protection");
                assert_eq!(waited_secs, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_is_terminal() {
        let refresh = scripted(vec![observed("opening"), observed("error_protect")]);

        let err = await_convergence(&protect_spec(), refresh).await.unwrap_err();
        match err {
            ReconcileError::ConvergenceFailed { reason, .. } => {
                assert_eq!(reason, "error_protect");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_is_success_for_delete() {
        let spec = WaitSpec::new("delete host_protection")
            .pending(["closing"])
            .absence(AbsenceRule::Success)
            .timeout(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(5));
        let refresh = scripted(vec![observed("closing"), Probe::Gone]);

        let result = await_convergence(&spec, refresh).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_is_failure_for_create() {
        let refresh = scripted(vec![observed("opening"), Probe::Gone]);

        let err = await_convergence(&protect_spec(), refresh).await.unwrap_err();
        match err {
            ReconcileError::ConvergenceFailed { reason, .. } => {
                assert!(reason.contains("disappeared"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_aborts_immediately() {
        let refresh = || {
            std::future::ready(Err(ReconcileError::Decoding {
                path: "protect_status".into(),
                detail: "expected a string".into(),
            }))
        };

        let err = await_convergence(&protect_spec(), refresh).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Decoding { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_waiting() {
        // A status in none of the sets is neither success nor failure.
        let refresh = scripted(vec![observed("partial_protect"), observed("opened")]);

        let record = await_convergence(&protect_spec(), refresh)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.get_str("protect_status"), Some("opened"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_runs_before_first_refresh() {
        let spec = protect_spec().initial_delay(Duration::from_secs(3));
        let refresh = scripted(vec![observed("opened")]);

        let started = Instant::now();
        await_convergence(&spec, refresh).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
