//! Response decoding.
//!
//! A [`ParserRegistry`] maps a response type tag such as `"json"` to the
//! MIME type sent in the `Accept` header and to the function that decodes
//! a successful response body. The registry is built once, before the
//! service starts, and is shared read-only afterwards.

mod json;
mod xml;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Document, ErrorKind, Result};

pub use xml::XmlElement;

/// Response type used by `GET` and `POST` unless a caller picks another one
pub const DEFAULT_RESPONSE_TYPE: &str = "json";

/// A function turning a response body into a [`Document`]
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<Document> + Send + Sync>;

/// MIME type and decode function registered for one response type
#[derive(Clone)]
pub struct Parser {
    mime_type: String,
    decode: DecodeFn,
}

impl Parser {
    /// MIME type requested via `Accept`
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decode a response body
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Parse`] if the body is malformed
    pub fn decode(&self, body: &[u8]) -> Result<Document> {
        (self.decode)(body)
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Mapping from response type tag to [`Parser`].
///
/// [`ParserRegistry::default`] contains the built-in `json` and `xml` parsers.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Parser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("xml", "application/xml", xml::parse_xml);
        registry.register("json", "application/json", json::parse_json);
        registry
    }
}

impl ParserRegistry {
    /// A registry without any parser
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register `decode` for `tag`, replacing an earlier registration
    pub fn register<F>(&mut self, tag: impl Into<String>, mime_type: impl Into<String>, decode: F)
    where
        F: Fn(&[u8]) -> Result<Document> + Send + Sync + 'static,
    {
        self.parsers.insert(
            tag.into(),
            Parser {
                mime_type: mime_type.into(),
                decode: Arc::new(decode),
            },
        );
    }

    /// MIME type registered for `tag`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnknownParser`] if `tag` was never registered
    pub fn mime_for(&self, tag: &str) -> Result<&str> {
        self.parser_for(tag).map(Parser::mime_type)
    }

    /// Parser registered for `tag`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnknownParser`] if `tag` was never registered
    pub fn parser_for(&self, tag: &str) -> Result<&Parser> {
        self.parsers
            .get(tag)
            .ok_or_else(|| ErrorKind::UnknownParser(tag.to_string()))
    }
}
