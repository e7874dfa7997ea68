use ::reqwest::{Client, Proxy, redirect};
use async_trait::async_trait;
use http::header::{CACHE_CONTROL, LOCATION};
use http::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;

use super::{ErrorCode, Reply, Transport, TransportError};
use crate::builder::RequestDescriptor;
use crate::{CacheLoadControl, ErrorKind, Result, ServiceConfig};

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// The client never follows redirects on its own.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client honoring the timeout and proxy settings of `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is rejected or the TLS backend
    /// cannot be initialized.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .gzip(true)
            .redirect(redirect::Policy::none());

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_config) = &config.proxy {
            let mut proxy =
                Proxy::all(proxy_config.url.as_str()).map_err(ErrorKind::BuildRequestClient)?;
            if let Some(username) = &proxy_config.username {
                let password = proxy_config
                    .password
                    .as_ref()
                    .map_or("", |p| p.expose_secret());
                proxy = proxy.basic_auth(username, password);
            }
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build().map_err(ErrorKind::BuildRequestClient)?,
        })
    }

    /// Wrap an existing client.
    ///
    /// The client should be configured with [`redirect::Policy::none`],
    /// otherwise redirect loop detection and per-destination pacing are
    /// bypassed for redirected requests.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: RequestDescriptor) -> Reply {
        let RequestDescriptor {
            method,
            url,
            mut headers,
            body,
            cache_load_control,
            ..
        } = request;

        if cache_load_control == Some(CacheLoadControl::AlwaysNetwork) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        let mut builder = self.client.request(method, url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let reply = Reply::new(url);
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return reply.with_error(transport_error(&e)),
        };

        let status = response.status();
        let mut reply = reply.with_status(status);
        reply.headers = response.headers().clone();
        if status.is_redirection() {
            reply.redirect = location(&reply.headers);
        }

        match response.bytes().await {
            Ok(bytes) => reply.body = bytes.to_vec(),
            Err(e) => return reply.with_error(transport_error(&e)),
        }

        if let Some(code) = ErrorCode::from_status(status) {
            reply.error = Some(TransportError::new(code, status.to_string()));
        }
        reply
    }
}

fn location(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn transport_error(error: &::reqwest::Error) -> TransportError {
    let code = if error.is_timeout() {
        ErrorCode::Timeout
    } else if error.is_connect() {
        ErrorCode::ConnectionRefused
    } else if error.is_body() || error.is_decode() {
        ErrorCode::RemoteHostClosed
    } else {
        ErrorCode::UnknownNetwork
    };
    TransportError::new(code, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;
    use http::{Method, StatusCode};
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: None,
            priority: Priority::Normal,
            cache_load_control: None,
        }
    }

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&ServiceConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ws/2/artist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let url = format!("{}/ws/2/artist", server.uri());
        let reply = transport().execute(descriptor(&url)).await;

        assert_eq!(reply.status, Some(StatusCode::OK));
        assert_eq!(reply.body, b"hello");
        assert!(reply.error.is_none());
        assert!(reply.redirect.is_none());
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&server)
            .await;

        let url = format!("{}/old", server.uri());
        let reply = transport().execute(descriptor(&url)).await;

        assert_eq!(reply.status, Some(StatusCode::MOVED_PERMANENTLY));
        assert_eq!(reply.redirect.as_deref(), Some("/new"));
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn test_http_error_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone fishing"))
            .mount(&server)
            .await;

        let reply = transport().execute(descriptor(&server.uri())).await;

        let error = reply.error.unwrap();
        assert_eq!(error.code, ErrorCode::ContentNotFound);
        assert_eq!(reply.body, b"gone fishing");
    }

    #[tokio::test]
    async fn test_always_network_disables_caches() {
        let server = MockServer::start().await;
        Mock::given(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = descriptor(&server.uri());
        request.cache_load_control = Some(CacheLoadControl::AlwaysNetwork);
        let reply = transport().execute(request).await;

        assert_eq!(reply.status, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on the discard port.
        let reply = transport().execute(descriptor("http://127.0.0.1:9/")).await;

        assert_eq!(reply.status, None);
        assert_eq!(reply.error.unwrap().code, ErrorCode::ConnectionRefused);
    }
}
