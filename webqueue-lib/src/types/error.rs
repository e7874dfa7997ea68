use std::path::PathBuf;
use thiserror::Error;

/// Possible errors when interacting with `webqueue_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A header value could not be constructed
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// Access tokens are sent verbatim in the `Authorization` header
    /// and therefore must be plain ASCII
    #[error("Access token contains non-ASCII characters")]
    InvalidAccessToken,

    /// A response type was requested that has no registered parser
    #[error(
        "Unknown parser for response type '{0}'. Parser for given response type does not exist."
    )]
    UnknownParser(String),

    /// A registered parser rejected an otherwise successful response body
    #[error("Unable to parse the response as {tag}: {reason}")]
    Parse {
        /// The response type whose parser failed
        tag: String,
        /// Description of the failure
        reason: String,
    },

    /// A URL could not be built or parsed
    #[error("Cannot parse URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A URL without a host cannot be scheduled
    #[error("URL is missing a host: {0}")]
    InvalidUrlHost(String),

    /// A destination written as `host:port` could not be parsed
    #[error("Invalid destination `{0}`, expected `host:port`")]
    InvalidDestination(String),

    /// The configuration file could not be read
    #[error("Failed to read configuration from `{}`: {}", .0.display(), .1)]
    ReadConfig(PathBuf, std::io::Error),

    /// The configuration file is not valid TOML for [`crate::ServiceConfig`]
    #[error("Failed to parse configuration: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// The underlying HTTP client could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The request was removed from its queue before it was sent,
    /// either explicitly or because the service was shut down
    #[error("Request was cancelled before completion")]
    Cancelled,

    /// The scheduler task is no longer running
    #[error("The web service has stopped")]
    ServiceStopped,
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UnknownParser(a), Self::UnknownParser(b))
            | (Self::InvalidUrlHost(a), Self::InvalidUrlHost(b))
            | (Self::InvalidDestination(a), Self::InvalidDestination(b)) => a == b,
            (
                Self::Parse { tag: t1, reason: r1 },
                Self::Parse { tag: t2, reason: r2 },
            ) => t1 == t2 && r1 == r2,
            (Self::UrlParse(a), Self::UrlParse(b)) => a == b,
            (Self::ReadConfig(p1, e1), Self::ReadConfig(p2, e2)) => {
                p1 == p2 && e1.kind() == e2.kind()
            }
            (Self::InvalidHeader(_), Self::InvalidHeader(_))
            | (Self::InvalidAccessToken, Self::InvalidAccessToken)
            | (Self::Cancelled, Self::Cancelled)
            | (Self::ServiceStopped, Self::ServiceStopped) => true,
            _ => false,
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ErrorKind {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::Cancelled
    }
}
