use std::collections::HashMap;
use std::time::Duration;

use crate::DestinationKey;

/// Default interval between requests to the same destination
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

/// Minimum spacing between request starts, per destination.
///
/// Destinations without an override use the default interval.
/// An interval of zero means the destination is not throttled at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIntervals {
    default: Duration,
    overrides: HashMap<DestinationKey, Duration>,
}

impl Default for RequestIntervals {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_INTERVAL)
    }
}

impl RequestIntervals {
    /// Create a policy with the given default and no overrides
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Get the effective interval for `key`, falling back to the default
    #[must_use]
    pub fn interval(&self, key: &DestinationKey) -> Duration {
        self.overrides.get(key).copied().unwrap_or(self.default)
    }

    /// Whether `key` has an explicit override
    #[must_use]
    pub fn is_configured(&self, key: &DestinationKey) -> bool {
        self.overrides.contains_key(key)
    }

    /// Set the interval for `key`, replacing any previous override
    pub fn set(&mut self, key: DestinationKey, interval: Duration) {
        self.overrides.insert(key, interval);
    }

    /// The interval used for destinations without an override
    #[must_use]
    pub const fn default_interval(&self) -> Duration {
        self.default
    }
}

impl Extend<(DestinationKey, Duration)> for RequestIntervals {
    fn extend<T: IntoIterator<Item = (DestinationKey, Duration)>>(&mut self, iter: T) {
        self.overrides.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_interval() {
        let mut intervals = RequestIntervals::default();
        let throttled = DestinationKey::new("musicbrainz.org", 443);
        let free = DestinationKey::new("coverartarchive.org", 443);

        assert_eq!(intervals.interval(&throttled), Duration::from_secs(1));
        assert!(!intervals.is_configured(&throttled));

        intervals.set(throttled.clone(), Duration::from_millis(500));
        intervals.set(free.clone(), Duration::ZERO);

        assert_eq!(intervals.interval(&throttled), Duration::from_millis(500));
        assert_eq!(intervals.interval(&free), Duration::ZERO);
        assert!(intervals.is_configured(&free));
    }
}
