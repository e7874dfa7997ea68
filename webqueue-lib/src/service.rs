//! The public face of the scheduler.
//!
//! A [`WebService`] is a cheap, cloneable handle. Every method sends a
//! message to the scheduler task and returns immediately; results arrive
//! through the [`Pending`] future returned by [`Call::submit`].

use http::Method;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use typed_builder::TypedBuilder;

use crate::auth::TokenProvider;
use crate::parser::{DEFAULT_RESPONSE_TYPE, ParserRegistry};
use crate::scheduler::{
    self, Command, RequestTask, Scheduler, SchedulerParts, ShutdownSummary, TaskHandle, TaskIds,
};
use crate::transport::{ReqwestTransport, Transport};
use crate::{
    CacheLoadControl, DestinationKey, ErrorKind, Priority, Request, Response, Result,
    ServiceConfig,
};

/// Configures and starts a [`WebService`].
///
/// ```no_run
/// # use webqueue_lib::{Result, ServiceBuilder};
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let service = ServiceBuilder::builder().build().start()?;
/// let response = service
///     .get("musicbrainz.org", 443, "/ws/2/artist/a74b1b7f-71a5-4011-9441-d0b5e4122711")
///     .query("inc", "aliases")
///     .submit()
///     .await?;
/// println!("{:?}", response.document);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug)]
#[builder(field_defaults(default))]
#[builder(builder_method(doc = "
Create a builder for a `WebService`.

Every field is optional. Without a transport, a `reqwest` based one is
built from the configuration.
"))]
pub struct ServiceBuilder {
    /// User agent, rate limits, timeouts and proxy
    config: ServiceConfig,

    /// Decoders for response types. Defaults to `json` and `xml`.
    parsers: ParserRegistry,

    /// Executes the requests
    #[builder(setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,

    /// Supplies bearer tokens for authenticated requests
    #[builder(setter(strip_option))]
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServiceBuilder {
    /// Spawn the scheduler and return a handle to it.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport was given and the default HTTP
    /// client cannot be created.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn start(self) -> Result<WebService> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = watch::channel(0);
        let task_ids = TaskIds::default();

        let scheduler = Scheduler::new(
            &self.config,
            SchedulerParts {
                parsers: Arc::new(self.parsers),
                transport,
                token_provider: self.token_provider,
                task_ids: task_ids.clone(),
                events: events_tx,
                pending: pending_tx,
            },
        );
        tokio::spawn(scheduler::run(scheduler, commands_rx, events_rx));

        Ok(WebService {
            commands: commands_tx,
            pending: pending_rx,
            task_ids,
        })
    }
}

/// Handle to a running scheduler.
///
/// The scheduler keeps running until every handle is dropped and all
/// outstanding requests are answered.
#[derive(Debug, Clone)]
pub struct WebService {
    commands: mpsc::UnboundedSender<Command>,
    pending: watch::Receiver<usize>,
    task_ids: TaskIds,
}

impl WebService {
    /// Prepare a `GET` request, parsed as JSON by default
    pub fn get(&self, host: impl AsRef<str>, port: u16, path: impl Into<String>) -> Call<'_> {
        self.call(Method::GET, host, port, path)
            .parse_type(DEFAULT_RESPONSE_TYPE)
    }

    /// Prepare an authenticated `POST` request, parsed as JSON by default
    pub fn post(
        &self,
        host: impl AsRef<str>,
        port: u16,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Call<'_> {
        self.call(Method::POST, host, port, path)
            .body(body)
            .parse_type(DEFAULT_RESPONSE_TYPE)
            .auth_required(true)
    }

    /// Prepare an authenticated `PUT` request with an unparsed response
    pub fn put(
        &self,
        host: impl AsRef<str>,
        port: u16,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Call<'_> {
        self.call(Method::PUT, host, port, path)
            .body(body)
            .priority(Priority::High)
            .auth_required(true)
    }

    /// Prepare an authenticated `DELETE` request with an unparsed response
    pub fn delete(&self, host: impl AsRef<str>, port: u16, path: impl Into<String>) -> Call<'_> {
        self.call(Method::DELETE, host, port, path)
            .priority(Priority::High)
            .auth_required(true)
    }

    /// Prepare a `GET` request whose body is delivered as is
    pub fn download(&self, host: impl AsRef<str>, port: u16, path: impl Into<String>) -> Call<'_> {
        self.call(Method::GET, host, port, path)
    }

    fn call(
        &self,
        method: Method,
        host: impl AsRef<str>,
        port: u16,
        path: impl Into<String>,
    ) -> Call<'_> {
        Call {
            service: self,
            request: Request::new(method, DestinationKey::new(host, port), path),
            priority: Priority::Normal,
            important: false,
        }
    }

    /// Remove a task that has not been sent yet.
    ///
    /// Its [`Pending`] resolves to [`ErrorKind::Cancelled`]. Tasks already
    /// in flight are not affected.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ServiceStopped`] if the scheduler is gone.
    pub fn cancel(&self, handle: &TaskHandle) -> Result<()> {
        self.send(Command::Cancel(handle.clone()))
    }

    /// Change the minimum interval between requests to `destination`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ServiceStopped`] if the scheduler is gone.
    pub fn set_request_interval(&self, destination: DestinationKey, interval: Duration) -> Result<()> {
        self.send(Command::SetRequestInterval(destination, interval))
    }

    /// Abort every in-flight request and drop every queued task.
    ///
    /// All affected callers receive [`ErrorKind::Cancelled`]. The service
    /// stays usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ServiceStopped`] if the scheduler is gone.
    pub async fn shutdown(&self) -> Result<ShutdownSummary> {
        let (reply, summary) = oneshot::channel();
        self.send(Command::Shutdown(reply))?;
        summary.await.map_err(|_| ErrorKind::ServiceStopped)
    }

    /// Number of requests queued or in flight, as last published
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        *self.pending.borrow()
    }

    /// Watch the pending request count.
    ///
    /// Updates are published while work remains and once more when the
    /// count drops to zero.
    #[must_use]
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ErrorKind::ServiceStopped)
    }
}

/// A request being prepared. Nothing happens until [`Call::submit`].
#[derive(Debug)]
#[must_use = "a call does nothing until it is submitted"]
pub struct Call<'a> {
    service: &'a WebService,
    request: Request,
    priority: Priority,
    important: bool,
}

impl Call<'_> {
    /// Append a query argument
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    /// Append several query arguments
    pub fn queries<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.request
            .query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Parse the response with the parser registered for `tag`
    pub fn parse_type(mut self, tag: impl Into<String>) -> Self {
        self.request.parse_type = Some(tag.into());
        self
    }

    /// Deliver the response body unparsed
    pub fn raw(mut self) -> Self {
        self.request.parse_type = None;
        self
    }

    /// Queue in the given priority tier
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Put the task in front of its queue
    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Attach a bearer token from the token provider
    pub fn auth_required(mut self, auth_required: bool) -> Self {
        self.request.auth_required = auth_required;
        self
    }

    /// Override the cache policy
    pub fn cache_load_control(mut self, cache_load_control: CacheLoadControl) -> Self {
        self.request.cache_load_control = Some(cache_load_control);
        self
    }

    /// Bypass any cache for this `GET` request
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.request.refresh = refresh;
        self
    }

    /// Queue the request.
    ///
    /// The returned future resolves once the request completed, failed or
    /// was cancelled. Dropping it does not cancel the request.
    pub fn submit(self) -> Pending {
        let Self {
            service,
            request,
            priority,
            important,
        } = self;

        if request.method == Method::POST {
            if let Some(body) = &request.body {
                log::debug!("POST-DATA {body}");
            }
        }

        let handle = TaskHandle::new(
            service.task_ids.next(),
            request.destination.clone(),
            priority,
        );
        let (responder, receiver) = oneshot::channel();
        let command = Command::Enqueue {
            handle: handle.clone(),
            task: RequestTask { request, responder },
            important,
        };
        if let Err(mpsc::error::SendError(Command::Enqueue { task, .. })) =
            service.commands.send(command)
        {
            let _ = task.responder.send(Err(ErrorKind::ServiceStopped));
        }

        Pending { handle, receiver }
    }
}

/// The outcome of a submitted request.
#[derive(Debug)]
#[must_use = "the response is lost unless the pending call is awaited"]
pub struct Pending {
    handle: TaskHandle,
    receiver: oneshot::Receiver<Result<Response>>,
}

impl Pending {
    /// Handle for [`WebService::cancel`]
    #[must_use]
    pub const fn handle(&self) -> &TaskHandle {
        &self.handle
    }
}

impl Future for Pending {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|e| Err(e.into())))
    }
}
