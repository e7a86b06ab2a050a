//! Paginated Request Fetcher
//!
//! The retrieval engine behind every discovery call. It rate-limits, times
//! out and instruments single requests, and drives sequential page fetches
//! for paginated listings.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = PaginatedRequestFetcher::new(Arc::new(PrometheusRecorder), 10.0, Duration::from_millis(500));
//!
//! let orgs = fetcher
//!     .perform_generic_paged_retrieval(
//!         RequestType::AllOrgs,
//!         "(empty)",
//!         ListOrganizationsRequest::paged,
//!         |request| client.list_organizations(request),
//!         Duration::from_millis(2500),
//!         ListOrganizationsResponse::aggregated,
//!     )
//!     .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::FetchError;
use super::model::{OrderDirection, Page};
use super::rate_gate::{Admission, RateGate};
use super::recorder::{MetricsRecorder, RequestOutcome};
use super::request_type::RequestType;

/// Page size requested for every paginated listing
pub const RESULTS_PER_PAGE: u32 = 100;

/// Order direction requested for every paginated listing
pub const ORDER_DIRECTION: OrderDirection = OrderDirection::Asc;

/// Rate-limited, timed, instrumented retrieval of control plane resources
///
/// Constructed once per process; clones share the same rate gate.
#[derive(Clone)]
pub struct PaginatedRequestFetcher {
    gate: RateGate,
    recorder: Arc<dyn MetricsRecorder>,
}

impl fmt::Debug for PaginatedRequestFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedRequestFetcher")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl PaginatedRequestFetcher {
    /// Create a fetcher
    ///
    /// # Arguments
    ///
    /// * `recorder` - Receives latency measurements per request type
    /// * `requests_per_second` - Shared outbound ceiling; zero or below means unlimited
    /// * `backoff` - Longest a request waits for a rate permit
    pub fn new(
        recorder: Arc<dyn MetricsRecorder>,
        requests_per_second: f64,
        backoff: Duration,
    ) -> Self {
        Self::with_gate(recorder, RateGate::new(requests_per_second, backoff))
    }

    pub fn with_gate(recorder: Arc<dyn MetricsRecorder>, gate: RateGate) -> Self {
        if gate.is_unlimited() {
            debug!("Control plane requests are not rate limited");
        } else {
            debug!(
                "Control plane requests limited to {:?} per second (backoff {:?})",
                gate.rate(),
                gate.backoff()
            );
        }

        Self { gate, recorder }
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.gate
    }

    /// Retrieve a single, non-paginated resource.
    ///
    /// `invoke` is only called once a rate permit has been granted. The
    /// future it returns is driven on its own task: once dispatched it runs
    /// to completion (or to its timeout) even when the caller stops waiting.
    /// The timeout covers both the rate gate wait and the invocation.
    ///
    /// # Errors
    ///
    /// * [`FetchError::RateUnavailable`] - no permit within the backoff bound
    ///   or before the timeout
    /// * [`FetchError::RequestTimeout`] - `timeout` elapsed
    /// * [`FetchError::Upstream`] - the invocation's own error, unmodified
    pub async fn perform_generic_retrieval<Q, P, E, F, Fut>(
        &self,
        request_type: RequestType,
        key: &str,
        request: Q,
        invoke: F,
        timeout: Duration,
    ) -> Result<P, FetchError<E>>
    where
        F: FnOnce(Q) -> Fut,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
        P: Send + 'static,
        E: Send + 'static,
    {
        let started = Instant::now();
        let deadline = started + timeout;

        let admission =
            tokio::time::timeout_at(deadline, self.gate.acquire_within(timeout)).await;
        let waited = match admission {
            Ok(Admission::Granted { waited }) => waited,
            Ok(Admission::Expired) => {
                let result = Err(FetchError::RateUnavailable {
                    backoff: self.gate.backoff(),
                });
                record_outcome(self.recorder.as_ref(), request_type, key, started, &result);
                return result;
            }
            Err(_) => {
                let result = Err(FetchError::RequestTimeout {
                    kind: request_type,
                    key: key.to_string(),
                    timeout,
                });
                record_outcome(self.recorder.as_ref(), request_type, key, started, &result);
                return result;
            }
        };

        if !waited.is_zero() {
            debug!("{} request for '{}' waited {:?} for a permit", request_type, key, waited);
        }
        self.recorder.observe_rate_wait(request_type, waited);

        let call = invoke(request);
        let recorder = Arc::clone(&self.recorder);
        let task_key = key.to_string();

        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result.map_err(FetchError::Upstream),
                Err(_) => Err(FetchError::RequestTimeout {
                    kind: request_type,
                    key: task_key.clone(),
                    timeout,
                }),
            };

            record_outcome(recorder.as_ref(), request_type, &task_key, started, &result);
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Only reachable while the runtime shuts down
            Err(_) => Err(FetchError::RequestTimeout {
                kind: request_type,
                key: key.to_string(),
                timeout,
            }),
        }
    }

    /// Retrieve every page of a paginated listing.
    ///
    /// Page 1 is fetched first and its declared page count decides how many
    /// further pages are requested, one after another. The first failing page
    /// aborts the whole retrieval; no partial result is ever produced. On
    /// success `response_generator` receives every collected resource in
    /// order together with the page count declared by page 1.
    ///
    /// The timeout applies to each page separately.
    pub async fn perform_generic_paged_retrieval<Q, P, R, Resp, E, G, F, Fut, B>(
        &self,
        request_type: RequestType,
        key: &str,
        request_generator: G,
        invoke: F,
        timeout: Duration,
        response_generator: B,
    ) -> Result<Resp, FetchError<E>>
    where
        G: Fn(OrderDirection, u32, u32) -> Q,
        F: Fn(Q) -> Fut,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
        P: Page<Resource = R> + Send + 'static,
        E: Send + 'static,
        B: FnOnce(Vec<R>, u32) -> Resp,
    {
        let first_request = request_generator(ORDER_DIRECTION, RESULTS_PER_PAGE, 1);
        let first = self
            .perform_generic_retrieval(request_type, key, first_request, &invoke, timeout)
            .await?;

        let total_pages = first.total_pages();
        let mut resources = first.into_resources();

        for page in 2..=total_pages {
            let request = request_generator(ORDER_DIRECTION, RESULTS_PER_PAGE, page);
            let next = self
                .perform_generic_retrieval(request_type, key, request, &invoke, timeout)
                .await?;
            resources.extend(next.into_resources());
        }

        debug!(
            "{} listing for '{}' collected {} resources across {} pages",
            request_type,
            key,
            resources.len(),
            total_pages
        );

        Ok(response_generator(resources, total_pages))
    }
}

/// Record latency and outcome of one retrieval and log it
fn record_outcome<P, E>(
    recorder: &dyn MetricsRecorder,
    request_type: RequestType,
    key: &str,
    started: Instant,
    result: &Result<P, FetchError<E>>,
) {
    let outcome = match result {
        Ok(_) => RequestOutcome::Success,
        Err(FetchError::RequestTimeout { .. }) => RequestOutcome::Timeout,
        Err(FetchError::RateUnavailable { .. }) => RequestOutcome::RateUnavailable,
        Err(FetchError::Upstream(_)) => RequestOutcome::Failure,
    };
    let latency = started.elapsed();
    recorder.observe_latency(request_type, latency, outcome);

    match outcome {
        RequestOutcome::Success => {
            debug!("{} request for '{}' completed in {:?}", request_type, key, latency)
        }
        RequestOutcome::Failure => {
            debug!("{} request for '{}' failed after {:?}", request_type, key, latency)
        }
        _ => warn!(
            "{} request for '{}' gave up after {:?} ({})",
            request_type,
            key,
            latency,
            outcome.as_str()
        ),
    }
}
