use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use url::Url;

use crate::parser::ParserRegistry;
use crate::{CacheLoadControl, DestinationKey, ErrorKind, HTTPS_PORT, Priority, Request, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request ready to be handed to a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Absolute URL, including the encoded query
    pub url: Url,
    /// All headers the transport must send
    pub headers: HeaderMap,
    /// Encoded body
    pub body: Option<Vec<u8>>,
    /// Transport priority hint
    pub priority: Priority,
    /// Cache policy for the transport
    pub cache_load_control: Option<CacheLoadControl>,
}

/// Turns scheduled [`Request`]s into [`RequestDescriptor`]s.
#[derive(Debug, Clone)]
pub(crate) struct RequestBuilder {
    user_agent: String,
    server_host: String,
    parsers: Arc<ParserRegistry>,
}

impl RequestBuilder {
    pub(crate) fn new(
        user_agent: impl Into<String>,
        server_host: impl Into<String>,
        parsers: Arc<ParserRegistry>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            server_host: server_host.into().to_lowercase(),
            parsers,
        }
    }

    /// Build the descriptor for `request`.
    ///
    /// `access_token` is only used when the request requires authentication.
    pub(crate) fn build(
        &self,
        request: &Request,
        access_token: Option<&SecretString>,
    ) -> Result<RequestDescriptor> {
        let url = build_url(&request.destination, &request.path, &request.query)?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        let mut priority = Priority::Normal;
        let mut cache_load_control = None;

        if request.auth_required {
            if let Some(token) = access_token {
                headers.insert(AUTHORIZATION, bearer(token)?);
            }
        }

        if request.auth_required || (request.method == Method::GET && request.refresh) {
            priority = Priority::High;
            cache_load_control = Some(CacheLoadControl::AlwaysNetwork);
        } else if request.method == Method::PUT || request.method == Method::DELETE {
            priority = Priority::High;
        } else if let Some(control) = request.cache_load_control {
            cache_load_control = Some(control);
        }

        let mime_type = request
            .parse_type
            .as_deref()
            .and_then(|tag| match self.parsers.mime_for(tag) {
                Ok(mime_type) => Some(mime_type),
                Err(e) => {
                    log::error!("{e}");
                    None
                }
            });
        if let Some(mime_type) = mime_type {
            headers.insert(ACCEPT, HeaderValue::from_str(mime_type)?);
        }

        if request.body.is_some() {
            let content_type = match mime_type {
                Some(mime_type)
                    if request.method == Method::POST
                        && request.destination.host() == self.server_host =>
                {
                    HeaderValue::from_str(&format!("{mime_type}; charset=utf-8"))?
                }
                _ => HeaderValue::from_static(FORM_CONTENT_TYPE),
            };
            headers.insert(CONTENT_TYPE, content_type);
        }

        Ok(RequestDescriptor {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone().map(String::into_bytes),
            priority,
            cache_load_control,
        })
    }
}

fn bearer(token: &SecretString) -> Result<HeaderValue> {
    let token = token.expose_secret();
    if !token.is_ascii() {
        return Err(ErrorKind::InvalidAccessToken);
    }
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Compose the absolute URL of a request.
///
/// The scheme is `https` exactly when the port is 443.
pub(crate) fn build_url(
    destination: &DestinationKey,
    path: &str,
    query: &[(String, String)],
) -> Result<Url> {
    let scheme = if destination.port() == HTTPS_PORT {
        "https"
    } else {
        "http"
    };
    let mut url = Url::parse(&format!("{scheme}://{}", destination.host()))?;
    url.set_port(Some(destination.port()))
        .map_err(|()| ErrorKind::InvalidUrlHost(destination.to_string()))?;
    url.set_path(path);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
