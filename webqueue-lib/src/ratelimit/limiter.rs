use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::RequestIntervals;
use crate::DestinationKey;

/// Whether a destination may fire now, and the relevant delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    /// `true` if the next request to the destination has to wait
    pub must_wait: bool,
    /// Time to wait if `must_wait`, otherwise the configured interval
    pub delay: Duration,
}

impl Delay {
    const fn ready(delay: Duration) -> Self {
        Self {
            must_wait: false,
            delay,
        }
    }

    const fn wait(delay: Duration) -> Self {
        Self {
            must_wait: true,
            delay,
        }
    }
}

/// Tracks when each destination was last contacted and decides
/// how long the next request to it has to wait.
///
/// The state is only mutated when a request is actually sent,
/// so queueing work never affects pacing.
#[derive(Debug, Default)]
pub struct RateLimiter {
    intervals: RequestIntervals,
    last_request: HashMap<DestinationKey, Instant>,
}

impl RateLimiter {
    /// Create a rate limiter with the given interval policy
    #[must_use]
    pub fn new(intervals: RequestIntervals) -> Self {
        Self {
            intervals,
            last_request: HashMap::new(),
        }
    }

    /// The interval policy
    #[must_use]
    pub const fn intervals(&self) -> &RequestIntervals {
        &self.intervals
    }

    /// Change the interval for a single destination
    pub fn set_interval(&mut self, key: DestinationKey, interval: Duration) {
        self.intervals.set(key, interval);
    }

    /// Effective interval for `key`
    #[must_use]
    pub fn interval(&self, key: &DestinationKey) -> Duration {
        self.intervals.interval(key)
    }

    /// Calculate the delay before the next request to `key` may start.
    ///
    /// The very first request to a throttled destination is never delayed,
    /// it only records the current time as baseline.
    pub fn delay_before_next(&mut self, key: &DestinationKey) -> Delay {
        let interval = self.intervals.interval(key);
        if interval.is_zero() {
            log::debug!("WSREQ: Starting another request to {key} without delay");
            return Delay::ready(Duration::ZERO);
        }

        let Some(last_request) = self.last_request.get(key) else {
            log::debug!("WSREQ: First request to {key}");
            self.last_request.insert(key.clone(), Instant::now());
            return Delay::ready(interval);
        };

        let elapsed = last_request.elapsed();
        if elapsed >= interval {
            log::debug!(
                "WSREQ: Last request to {key} was {} ms ago, starting another one",
                elapsed.as_millis()
            );
            return Delay::ready(interval);
        }

        let delay = ceil_millis(interval - elapsed);
        log::debug!(
            "WSREQ: Last request to {key} was {} ms ago, waiting {} ms before starting another one",
            elapsed.as_millis(),
            delay.as_millis()
        );
        Delay::wait(delay)
    }

    /// Record that a request to `key` was sent just now.
    ///
    /// Unthrottled destinations need no bookkeeping.
    pub fn record_sent(&mut self, key: &DestinationKey) {
        if !self.intervals.interval(key).is_zero() {
            self.last_request.insert(key.clone(), Instant::now());
        }
    }

    /// Copy the interval of `origin` to `target` when a redirect crosses
    /// destinations, so a throttled origin cannot be bypassed by redirecting
    /// to a destination that was never configured.
    ///
    /// Returns `true` if `target` now carries the origin's interval.
    pub fn inherit_interval(&mut self, origin: &DestinationKey, target: &DestinationKey) -> bool {
        if !self.intervals.is_configured(origin) || self.intervals.is_configured(target) {
            return false;
        }
        let interval = self.intervals.interval(origin);
        if interval.is_zero() {
            return false;
        }
        log::debug!(
            "Setting rate limit for {target} to {} ms",
            interval.as_millis()
        );
        self.intervals.set(target.clone(), interval);
        true
    }
}

/// Round up to whole milliseconds
fn ceil_millis(duration: Duration) -> Duration {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}
