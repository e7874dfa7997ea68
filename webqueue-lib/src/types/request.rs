use http::Method;

use crate::{CacheLoadControl, DestinationKey};

/// Everything needed to build and send one HTTP request.
///
/// This is the inspectable unit of work stored in the scheduler queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method, one of `GET`, `POST`, `PUT` or `DELETE`
    pub method: Method,
    /// Where the request is sent and paced against
    pub destination: DestinationKey,
    /// Absolute path, starting with `/`
    pub path: String,
    /// Optional request body
    pub body: Option<String>,
    /// Query arguments, in insertion order
    pub query: Vec<(String, String)>,
    /// Response type tag used to pick the `Accept` header and the parser
    pub parse_type: Option<String>,
    /// Whether a bearer token must be attached
    pub auth_required: bool,
    /// Explicit cache policy
    pub cache_load_control: Option<CacheLoadControl>,
    /// Bypass the cache for this request
    pub refresh: bool,
}

impl Request {
    /// Create a request with no body, no query and no special policy
    #[must_use]
    pub fn new(method: Method, destination: DestinationKey, path: impl Into<String>) -> Self {
        Self {
            method,
            destination,
            path: path.into(),
            body: None,
            query: Vec::new(),
            parse_type: None,
            auth_required: false,
            cache_load_control: None,
            refresh: false,
        }
    }
}
