use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use std::{env::consts, fs};
use url::Url;

use crate::ratelimit::{DEFAULT_REQUEST_INTERVAL, RequestIntervals};
use crate::{DestinationKey, ErrorKind, Result};

/// Host that receives `POST` bodies typed by the response parser
pub const DEFAULT_SERVER_HOST: &str = "musicbrainz.org";

/// Path of the token endpoint, which is itself never authenticated
pub const DEFAULT_TOKEN_ENDPOINT: &str = "/oauth2/token";

/// How often the pending request count is re-published while work remains
pub const DEFAULT_COUNT_PENDING_INTERVAL: Duration = Duration::from_millis(250);

/// The user agent sent with every request unless configured otherwise
#[must_use]
pub fn default_user_agent() -> String {
    format!(
        "webqueue/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        consts::OS,
        consts::ARCH
    )
}

/// Service settings, usually read from a TOML file.
///
/// ```toml
/// user_agent = "my-tagger/1.0"
/// default_request_interval = "1s"
/// timeout = "30s"
///
/// [request_intervals]
/// "coverartarchive.org:443" = "0s"
/// ```
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Value of the `User-Agent` header
    pub user_agent: String,

    /// Primary server; `POST` requests to it get a typed `Content-Type`
    pub server_host: String,

    /// Interval for destinations without an explicit entry
    #[serde(with = "humantime_serde")]
    pub default_request_interval: Duration,

    /// Per-destination intervals, keyed by `host:port`
    #[serde(deserialize_with = "deserialize_intervals")]
    pub request_intervals: HashMap<DestinationKey, Duration>,

    /// Path of the token endpoint
    pub token_endpoint: String,

    /// Period of the pending count publication
    #[serde(with = "humantime_serde")]
    pub count_pending_interval: Duration,

    /// Total timeout of a single exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Proxy for all requests
    pub proxy: Option<ProxyConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            default_request_interval: DEFAULT_REQUEST_INTERVAL,
            request_intervals: HashMap::new(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            count_pending_interval: DEFAULT_COUNT_PENDING_INTERVAL,
            timeout: None,
            proxy: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|e| ErrorKind::ReadConfig(path.to_path_buf(), e))?;
        Ok(toml::from_str(&contents)?)
    }

    /// The interval policy described by this configuration
    #[must_use]
    pub fn request_intervals(&self) -> RequestIntervals {
        let mut intervals = RequestIntervals::new(self.default_request_interval);
        intervals.extend(
            self.request_intervals
                .iter()
                .map(|(key, interval)| (key.clone(), *interval)),
        );
        intervals
    }
}

/// An HTTP proxy, optionally with basic authentication
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.local:3128`
    pub url: Url,
    /// Basic auth user name
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<SecretString>,
}

fn deserialize_intervals<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<DestinationKey, Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = HashMap::<DestinationKey, humantime_serde::Serde<Duration>>::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .map(|(key, interval)| (key, interval.into_inner()))
        .collect())
}
