use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::{ErrorKind, Result};

/// Default port for `https` URLs
pub const HTTPS_PORT: u16 = 443;
/// Default port for every other scheme
pub const HTTP_PORT: u16 = 80;

/// The remote endpoint a request is sent to.
///
/// Two requests to the same host and port share one pacing budget and one
/// queue per priority, regardless of their path.
///
/// # Examples
///
/// ```
/// use webqueue_lib::DestinationKey;
/// use url::Url;
///
/// let url = Url::parse("https://MusicBrainz.org/ws/2/release").unwrap();
/// let key = DestinationKey::try_from(&url).unwrap();
/// assert_eq!(key.to_string(), "musicbrainz.org:443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey {
    host: String,
    port: u16,
}

impl DestinationKey {
    /// Create a key, normalizing the host to lowercase
    #[must_use]
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            host: host.as_ref().to_lowercase(),
            port,
        }
    }

    /// Get the hostname
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// The effective port of `url`: the explicit port if any, otherwise 443
/// for `https` and 80 for everything else.
#[must_use]
pub fn url_port(url: &Url) -> u16 {
    url.port().unwrap_or(if url.scheme() == "https" {
        HTTPS_PORT
    } else {
        HTTP_PORT
    })
}

impl TryFrom<&Url> for DestinationKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| ErrorKind::InvalidUrlHost(url.to_string()))?;
        Ok(Self::new(host, url_port(url)))
    }
}

impl FromStr for DestinationKey {
    type Err = ErrorKind;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidDestination(input.to_string());
        let (host, port) = input.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Serialize for DestinationKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DestinationKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        Self::from_str(&string).map_err(serde::de::Error::custom)
    }
}
