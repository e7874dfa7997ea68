//! The seam between the scheduler and the network.
//!
//! The scheduler never talks HTTP itself. It hands a fully built
//! [`RequestDescriptor`] to a [`Transport`] and waits for a [`Reply`].
//! Redirects are *not* followed by the transport: a 3xx answer is reported
//! through [`Reply::redirect`] so the scheduler can apply loop detection and
//! rate limiting to the new destination.

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::fmt::{self, Debug, Display};
use url::Url;

use crate::builder::RequestDescriptor;

mod reqwest;

pub use self::reqwest::ReqwestTransport;

/// Executes a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send the request and wait for the complete reply.
    ///
    /// Failures are reported inside the [`Reply`] rather than as an `Err`,
    /// so that status, headers and body of an error response stay available.
    async fn execute(&self, request: RequestDescriptor) -> Reply;
}

/// Numeric error classes reported with a failed reply.
///
/// The numbering groups failures by layer: network (1-99),
/// content (201-299), protocol (301-399) and server (401-499).
/// `0` is reserved for success, see [`crate::Response::error_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The remote host refused the connection
    ConnectionRefused = 1,
    /// The remote host closed the connection prematurely
    RemoteHostClosed = 2,
    /// The host name could not be resolved
    HostNotFound = 3,
    /// The connection or the request timed out
    Timeout = 4,
    /// The operation was aborted locally
    OperationCanceled = 5,
    /// TLS could not be negotiated
    SslHandshakeFailed = 6,
    /// The network is temporarily unavailable
    TemporaryNetworkFailure = 7,
    /// A redirect pointed back at the URL that issued it
    RedirectLoop = 16,
    /// Any other network-level failure
    UnknownNetwork = 99,
    /// HTTP 403
    ContentAccessDenied = 201,
    /// HTTP 404 and 410
    ContentNotFound = 203,
    /// HTTP 401
    AuthenticationRequired = 204,
    /// HTTP 409
    ContentConflict = 206,
    /// Any other HTTP 4xx
    UnknownContent = 299,
    /// The reply could not be understood
    ProtocolFailure = 399,
    /// HTTP 500
    InternalServerError = 401,
    /// HTTP 503
    ServiceUnavailable = 403,
    /// Any other HTTP 5xx
    UnknownServer = 499,
}

impl ErrorCode {
    /// The numeric value of this error class
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Classify an HTTP status, `None` for non-error statuses
    #[must_use]
    pub fn from_status(status: StatusCode) -> Option<Self> {
        let code = match status {
            StatusCode::UNAUTHORIZED => Self::AuthenticationRequired,
            StatusCode::FORBIDDEN => Self::ContentAccessDenied,
            StatusCode::NOT_FOUND | StatusCode::GONE => Self::ContentNotFound,
            StatusCode::CONFLICT => Self::ContentConflict,
            StatusCode::INTERNAL_SERVER_ERROR => Self::InternalServerError,
            StatusCode::SERVICE_UNAVAILABLE => Self::ServiceUnavailable,
            s if s.is_client_error() => Self::UnknownContent,
            s if s.is_server_error() => Self::UnknownServer,
            _ => return None,
        };
        Some(code)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A failed exchange: the error class plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Error class
    pub code: ErrorCode,
    /// Description as reported by the transport
    pub message: String,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Everything a transport learned about one exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The URL that was requested
    pub url: Url,
    /// HTTP status, if a response was received
    pub status: Option<StatusCode>,
    /// HTTP reason phrase
    pub reason: Option<String>,
    /// Response headers
    pub headers: HeaderMap,
    /// Complete response body
    pub body: Vec<u8>,
    /// Raw `Location` of a redirect response, possibly relative
    pub redirect: Option<String>,
    /// Whether the reply came from a cache
    pub from_cache: bool,
    /// Set if the exchange failed
    pub error: Option<TransportError>,
}

impl Reply {
    /// An empty reply for `url`, as produced by an exchange that returned
    /// nothing at all
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            status: None,
            reason: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            redirect: None,
            from_cache: false,
            error: None,
        }
    }

    /// Set the status and its canonical reason phrase
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self.reason = status.canonical_reason().map(str::to_string);
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Mark this reply as a redirect to `location`
    #[must_use]
    pub fn with_redirect(mut self, location: impl Into<String>) -> Self {
        self.redirect = Some(location.into());
        self
    }

    /// Mark this reply as failed
    #[must_use]
    pub fn with_error(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }

    /// Mark this reply as served from cache
    #[must_use]
    pub const fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
