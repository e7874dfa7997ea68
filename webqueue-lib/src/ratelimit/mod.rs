//! Per-destination request pacing.
//!
//! Every [`DestinationKey`](crate::DestinationKey) has a minimum spacing
//! between the starts of two consecutive requests. The scheduler asks the
//! [`RateLimiter`] on every dispatch pass whether a destination may fire
//! and, if not, how long it has to wait. There is no timer per destination.
//!
//! - [`RequestIntervals`]: the interval policy, a default plus per-destination overrides
//! - [`RateLimiter`]: the policy together with the time of the last request per destination
//! - [`Delay`]: the answer to "may this destination fire now?"

mod config;
mod limiter;

pub use config::{DEFAULT_REQUEST_INTERVAL, RequestIntervals};
pub use limiter::{Delay, RateLimiter};
