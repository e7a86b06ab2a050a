//! Outbound Rate Gate
//!
//! A single token bucket shared by every in-flight control plane request.
//!
//! Permits are handed out by reservation: a caller that finds the bucket empty
//! books the next free slot (driving the bucket into debt) and then sleeps
//! until that slot arrives. Callers whose slot would lie beyond the backoff
//! bound are turned away without booking anything. The mutex only guards the
//! bookkeeping, never the wait.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of [`RateGate::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A permit was obtained after waiting `waited`
    Granted { waited: Duration },
    /// No permit could be obtained within the backoff bound
    Expired,
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    /// Stored permits; negative while callers hold reservations
    tokens: f64,

    /// Last refill time
    last_refill: Instant,
}

/// A booked slot whose holder is still waiting for it
struct Reservation<'a> {
    gate: &'a RateGate,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.refund(Instant::now());
        }
    }
}

/// Shared requests-per-second throttle
///
/// Cloning yields another handle onto the same bucket.
#[derive(Debug, Clone)]
pub struct RateGate {
    /// Permits per second; `None` means unlimited
    rate: Option<f64>,

    /// Maximum stored permits
    capacity: f64,

    /// Longest a caller waits for its permit
    backoff: Duration,

    bucket: Arc<Mutex<Bucket>>,
}

impl RateGate {
    /// Create a gate admitting `requests_per_second` requests.
    ///
    /// A rate of zero or below (or a non-finite rate) disables throttling.
    pub fn new(requests_per_second: f64, backoff: Duration) -> Self {
        let rate = (requests_per_second.is_finite() && requests_per_second > 0.0)
            .then_some(requests_per_second);
        let capacity = rate.map(|r| r.max(1.0)).unwrap_or(0.0);

        Self {
            rate,
            capacity,
            backoff,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
        }
    }

    /// A gate that never throttles
    pub fn unlimited() -> Self {
        Self::new(0.0, Duration::ZERO)
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate.is_none()
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Configured rate, `None` when unlimited
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Obtain one permit, suspending the calling task until it is available.
    pub async fn acquire(&self) -> Admission {
        self.acquire_within(self.backoff).await
    }

    /// Obtain one permit, waiting no longer than `limit` or the backoff,
    /// whichever is shorter.
    ///
    /// A caller dropped while waiting for its slot hands the slot back.
    pub async fn acquire_within(&self, limit: Duration) -> Admission {
        let bound = limit.min(self.backoff);
        let wait = match self.reserve(Instant::now(), bound) {
            Some(wait) => wait,
            None => return Admission::Expired,
        };

        if !wait.is_zero() {
            let mut pending = Reservation {
                gate: self,
                armed: true,
            };
            tokio::time::sleep(wait).await;
            pending.armed = false;
        }

        Admission::Granted { waited: wait }
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn refill(&self, bucket: &mut Bucket, rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * rate).min(self.capacity);
        bucket.last_refill = now;
    }

    /// Book a permit at `now`, returning how long the caller must wait for it.
    ///
    /// Returns `None` without booking when the wait would exceed `bound`.
    fn reserve(&self, now: Instant, bound: Duration) -> Option<Duration> {
        let rate = match self.rate {
            Some(rate) => rate,
            None => return Some(Duration::ZERO),
        };

        let mut bucket = self.lock();
        self.refill(&mut bucket, rate, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Some(Duration::ZERO);
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / rate);
        if wait > bound {
            return None;
        }

        bucket.tokens -= 1.0;
        Some(wait)
    }

    /// Give back a booked permit that will never be used
    fn refund(&self, now: Instant) {
        let rate = match self.rate {
            Some(rate) => rate,
            None => return,
        };

        let mut bucket = self.lock();
        self.refill(&mut bucket, rate, now);
        bucket.tokens = (bucket.tokens + 1.0).min(self.capacity);
    }

    /// Permits currently stored (negative while reservations are pending)
    pub fn available(&self) -> f64 {
        match self.rate {
            None => f64::INFINITY,
            Some(_) => self.lock().tokens,
        }
    }
}
