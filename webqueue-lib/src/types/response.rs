use http::{HeaderMap, StatusCode};
use std::borrow::Cow;
use url::Url;

use crate::parser::XmlElement;
use crate::transport::TransportError;

/// The body handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// Unparsed response bytes
    Raw(Vec<u8>),
    /// Output of the `json` parser
    Json(serde_json::Value),
    /// Output of the `xml` parser
    Xml(XmlElement),
}

impl Document {
    /// The raw body as text, if this document was not parsed
    #[must_use]
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Document::Raw(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    /// Returns `true` if no parser was applied
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Document::Raw(_))
    }
}

/// The outcome of a request, delivered exactly once to the caller.
///
/// Transport failures and redirect loops are reported through
/// [`Response::error`] rather than as an `Err`, so the caller still gets
/// whatever body and status the server produced.
#[derive(Debug, Clone)]
pub struct Response {
    /// The URL that produced this response, after following redirects
    pub url: Url,
    /// HTTP status code, if the exchange got that far
    pub status: Option<StatusCode>,
    /// HTTP reason phrase
    pub reason: Option<String>,
    /// Response headers
    pub headers: HeaderMap,
    /// Whether the transport served this response from its cache
    pub from_cache: bool,
    /// Parsed or raw body
    pub document: Document,
    /// `None` on success
    pub error: Option<TransportError>,
}

impl Response {
    /// Numeric error code, `0` meaning success
    #[must_use]
    pub fn error_code(&self) -> i32 {
        self.error.as_ref().map_or(0, |error| error.code.code())
    }

    /// Returns `true` if no error was reported
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
