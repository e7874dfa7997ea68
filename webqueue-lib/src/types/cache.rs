use serde::{Deserialize, Serialize};

/// How a transport should use its response cache for a request.
///
/// Caching itself lives in the transport. The scheduler only decides which
/// policy a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheLoadControl {
    /// Bypass the cache and always hit the network
    AlwaysNetwork,
    /// Use the network unless the cached entry is still fresh
    PreferNetwork,
    /// Use a cached entry if there is one, regardless of freshness
    PreferCache,
    /// Never touch the network
    AlwaysCache,
}
