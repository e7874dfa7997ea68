use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::queue::{QueueTable, RequestTask, TaskHandle, TaskIds};
use super::timer::OneShotTimer;
use super::{Command, Event, ShutdownSummary};
use crate::auth::TokenProvider;
use crate::builder::RequestBuilder;
use crate::parser::ParserRegistry;
use crate::ratelimit::RateLimiter;
use crate::tracker::{InFlightRequest, PendingRequestTracker};
use crate::transport::Transport;
use crate::{DestinationKey, ServiceConfig};

/// Everything the scheduler needs from the outside world
#[derive(Debug)]
pub(crate) struct SchedulerParts {
    pub(crate) parsers: Arc<ParserRegistry>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) token_provider: Option<Arc<dyn TokenProvider>>,
    pub(crate) task_ids: TaskIds,
    pub(crate) events: mpsc::UnboundedSender<Event>,
    pub(crate) pending: watch::Sender<usize>,
}

/// Owns the queues, the rate limiter and the in-flight requests.
#[derive(Debug)]
pub(crate) struct Scheduler {
    pub(super) queues: QueueTable,
    pub(super) rate_limiter: RateLimiter,
    pub(super) tracker: PendingRequestTracker,
    pub(super) parsers: Arc<ParserRegistry>,
    pub(super) task_ids: TaskIds,
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    token_endpoint: String,
    events: mpsc::UnboundedSender<Event>,
    dispatch_timer: OneShotTimer,
    count_timer: OneShotTimer,
    count_interval: Duration,
    pending: watch::Sender<usize>,
    /// Bumped on shutdown so token lookups started before it are dropped
    generation: u64,
    awaiting_token: usize,
}

impl Scheduler {
    pub(crate) fn new(config: &ServiceConfig, parts: SchedulerParts) -> Self {
        let SchedulerParts {
            parsers,
            transport,
            token_provider,
            task_ids,
            events,
            pending,
        } = parts;
        Self {
            queues: QueueTable::default(),
            rate_limiter: RateLimiter::new(config.request_intervals()),
            tracker: PendingRequestTracker::default(),
            builder: RequestBuilder::new(
                config.user_agent.clone(),
                config.server_host.clone(),
                Arc::clone(&parsers),
            ),
            parsers,
            task_ids,
            transport,
            token_provider,
            token_endpoint: config.token_endpoint.clone(),
            events,
            dispatch_timer: OneShotTimer::default(),
            count_timer: OneShotTimer::default(),
            count_interval: config.count_pending_interval,
            pending,
            generation: 0,
            awaiting_token: 0,
        }
    }

    pub(crate) fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enqueue {
                handle,
                task,
                important,
            } => self.enqueue(&handle, task, important),
            Command::Cancel(handle) => self.cancel(&handle),
            Command::SetRequestInterval(key, interval) => {
                self.set_request_interval(key, interval);
            }
            Command::Shutdown(reply) => {
                let summary = self.shutdown();
                // The caller may have stopped waiting
                let _ = reply.send(summary);
            }
        }
    }

    pub(crate) fn handle_event(&mut self, event: Event) {
        match event {
            Event::Authorized {
                task,
                token,
                generation,
            } => {
                if generation == self.generation {
                    self.awaiting_token = self.awaiting_token.saturating_sub(1);
                    self.transmit(task, token.as_ref());
                } else {
                    log::debug!(
                        "Dropping request to {}{} authorized before shutdown",
                        task.request.destination,
                        task.request.path
                    );
                }
                self.schedule_count();
            }
            Event::Completed { id, reply } => self.process_reply(id, reply),
        }
    }

    /// Queue a task and make sure the queues get serviced
    pub(crate) fn enqueue(&mut self, handle: &TaskHandle, task: RequestTask, important: bool) {
        self.queues.push(handle, task, important);
        self.dispatch_timer.start(Duration::ZERO);
        self.schedule_count();
    }

    /// Remove a task that has not been sent yet
    pub(crate) fn cancel(&mut self, handle: &TaskHandle) {
        if self.queues.remove(handle).is_some() {
            log::debug!("Cancelled request to {}", handle.destination());
            self.schedule_count();
        } else {
            log::debug!(
                "Request to {} already started or finished, not cancelled",
                handle.destination()
            );
        }
    }

    /// Start at most one task per destination queue, then re-arm the
    /// dispatch timer for the earliest destination that still has work.
    pub(crate) fn run_pending(&mut self) {
        self.dispatch_timer.clear();
        let mut next_wake: Option<Duration> = None;

        for priority in self.queues.priorities() {
            let mut destinations = self.queues.destinations(priority);
            destinations.sort_by(|a, b| {
                self.rate_limiter
                    .interval(a)
                    .cmp(&self.rate_limiter.interval(b))
                    .then_with(|| a.cmp(b))
            });

            for key in destinations {
                if self.queues.queue_len(priority, &key) == 0 {
                    continue;
                }
                let delay = self.rate_limiter.delay_before_next(&key);
                if !delay.must_wait {
                    if let Some(entry) = self.queues.pop_front(priority, &key) {
                        self.start_request(entry.task);
                    }
                }
                if delay.must_wait || self.queues.queue_len(priority, &key) > 0 {
                    next_wake = Some(next_wake.map_or(delay.delay, |d| d.min(delay.delay)));
                }
            }
        }

        self.queues.prune();
        if let Some(delay) = next_wake {
            self.dispatch_timer.start(delay);
        }
    }

    /// Publish the number of pending requests
    pub(crate) fn count_pending(&mut self) {
        self.count_timer.clear();
        let count = self.pending_count();
        self.pending.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
        if count > 0 {
            self.count_timer.start(self.count_interval);
        }
    }

    /// Publish the pending count on the next tick, unless a tick is
    /// already due. Bursts of changes collapse into one notification.
    pub(super) fn schedule_count(&mut self) {
        self.count_timer.start(Duration::ZERO);
    }

    /// In-flight plus queued requests, including those waiting for a token
    pub(crate) fn pending_count(&self) -> usize {
        self.tracker.len() + self.queues.len() + self.awaiting_token
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Abort everything in flight and drop everything queued
    pub(crate) fn shutdown(&mut self) -> ShutdownSummary {
        let summary = ShutdownSummary {
            aborted: self.tracker.abort_all(),
            discarded: self.queues.clear(),
        };
        self.generation += 1;
        self.awaiting_token = 0;
        self.dispatch_timer.clear();
        self.count_pending();
        log::info!(
            "Shut down web service: {} requests aborted, {} discarded",
            summary.aborted,
            summary.discarded
        );
        summary
    }

    pub(crate) const fn dispatch_deadline(&self) -> Option<Instant> {
        self.dispatch_timer.deadline()
    }

    pub(crate) const fn count_deadline(&self) -> Option<Instant> {
        self.count_timer.deadline()
    }

    fn start_request(&mut self, task: RequestTask) {
        let request = &task.request;
        if request.auth_required && request.path != self.token_endpoint {
            if let Some(provider) = &self.token_provider {
                // Claim the slot now, the token lookup may take a while
                self.rate_limiter.record_sent(&request.destination);
                let provider = Arc::clone(provider);
                let events = self.events.clone();
                let generation = self.generation;
                self.awaiting_token += 1;
                tokio::spawn(async move {
                    let token = provider.access_token().await;
                    // The scheduler owns the receiver and outlives this task
                    let _ = events.send(Event::Authorized {
                        task,
                        token,
                        generation,
                    });
                });
                return;
            }
        }
        self.transmit(task, None);
    }

    fn transmit(&mut self, task: RequestTask, token: Option<&SecretString>) {
        let RequestTask { request, responder } = task;
        let descriptor = match self.builder.build(&request, token) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::error!(
                    "Unable to build request to {}{}: {e}",
                    request.destination,
                    request.path
                );
                let _ = responder.send(Err(e));
                return;
            }
        };

        self.rate_limiter.record_sent(&request.destination);
        log::debug!("{} {}", descriptor.method, descriptor.url);

        let id = self.tracker.next_id();
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let outbound = descriptor.clone();
        let handle = tokio::spawn(async move {
            let reply = transport.execute(outbound).await;
            let _ = events.send(Event::Completed { id, reply });
        });

        self.tracker.register(
            id,
            InFlightRequest {
                descriptor,
                request,
                responder,
                abort: handle.abort_handle(),
            },
        );
    }

    fn set_request_interval(&mut self, key: DestinationKey, interval: Duration) {
        log::debug!("Request interval for {key} set to {} ms", interval.as_millis());
        self.rate_limiter.set_interval(key, interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::scheduler::TaskId;
    use crate::test_utils::MockTransport;
    use crate::{Priority, Request};
    use http::Method;
    use tokio::sync::oneshot;

    struct Harness {
        scheduler: Scheduler,
        events: mpsc::UnboundedReceiver<Event>,
        pending: watch::Receiver<usize>,
        transport: Arc<MockTransport>,
    }

    fn harness(config: &ServiceConfig) -> Harness {
        harness_with_tokens(config, None)
    }

    fn harness_with_tokens(
        config: &ServiceConfig,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> Harness {
        let transport = Arc::new(MockTransport::new());
        let (events_tx, events) = mpsc::unbounded_channel();
        let (pending_tx, pending) = watch::channel(0);
        let scheduler = Scheduler::new(
            config,
            SchedulerParts {
                parsers: Arc::new(ParserRegistry::default()),
                transport: transport.clone(),
                token_provider,
                task_ids: TaskIds::default(),
                events: events_tx,
                pending: pending_tx,
            },
        );
        Harness {
            scheduler,
            events,
            pending,
            transport,
        }
    }

    fn submit(
        scheduler: &mut Scheduler,
        key: &DestinationKey,
        priority: Priority,
    ) -> (TaskHandle, oneshot::Receiver<crate::Result<crate::Response>>) {
        let (responder, receiver) = oneshot::channel();
        let handle = TaskHandle::new(scheduler.task_ids.next(), key.clone(), priority);
        let task = RequestTask {
            request: Request::new(Method::GET, key.clone(), "/"),
            responder,
        };
        scheduler.enqueue(&handle, task, false);
        (handle, receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_count_tracks_queue() {
        let key = DestinationKey::new("musicbrainz.org", 443);
        let Harness {
            mut scheduler,
            pending,
            ..
        } = harness(&ServiceConfig::default());

        let (first, _) = submit(&mut scheduler, &key, Priority::Normal);
        let (_second, _) = submit(&mut scheduler, &key, Priority::Normal);
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.count_pending();
        assert_eq!(*pending.borrow(), 2);

        scheduler.cancel(&first);
        scheduler.count_pending();
        assert_eq!(*pending.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completions_publish_pending_count_once() {
        let Harness {
            mut scheduler,
            mut events,
            mut pending,
            ..
        } = harness(&ServiceConfig::default());

        for host in ["a.example", "b.example", "c.example"] {
            let _ = submit(&mut scheduler, &DestinationKey::new(host, 80), Priority::Normal);
        }
        let _ = submit(
            &mut scheduler,
            &DestinationKey::new("a.example", 80),
            Priority::Normal,
        );
        scheduler.run_pending();
        assert_eq!(scheduler.tracker.len(), 3);

        for _ in 0..3 {
            let Some(Event::Completed { id, reply }) = events.recv().await else {
                panic!("expected a completion");
            };
            scheduler.process_reply(id, reply);
        }
        assert!(!pending.has_changed().unwrap());
        assert!(scheduler.count_deadline().is_some());

        // The debounce timer fires once for the whole burst
        scheduler.count_pending();
        assert!(pending.has_changed().unwrap());
        assert_eq!(*pending.borrow_and_update(), 1);
        assert!(!pending.has_changed().unwrap());
        assert_eq!(
            scheduler.count_deadline(),
            Some(Instant::now() + Duration::from_millis(250))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_awaiting_token_is_pending() {
        let provider: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new("abc123"));
        let Harness {
            mut scheduler,
            mut events,
            transport,
            ..
        } = harness_with_tokens(&ServiceConfig::default(), Some(provider));

        let key = DestinationKey::new("musicbrainz.org", 443);
        let (responder, mut receiver) = oneshot::channel();
        let mut request = Request::new(Method::POST, key.clone(), "/ws/2/collection");
        request.auth_required = true;
        let handle = TaskHandle::new(scheduler.task_ids.next(), key, Priority::Normal);
        scheduler.enqueue(&handle, RequestTask { request, responder }, false);

        scheduler.run_pending();
        assert_eq!(scheduler.queues.len(), 0);
        assert_eq!(scheduler.tracker.len(), 0);
        assert_eq!(scheduler.pending_count(), 1);
        assert!(!scheduler.is_idle());

        let Some(event @ Event::Authorized { .. }) = events.recv().await else {
            panic!("expected a token");
        };
        scheduler.handle_event(event);
        assert_eq!(scheduler.tracker.len(), 1);
        assert_eq!(scheduler.pending_count(), 1);

        let Some(event @ Event::Completed { .. }) = events.recv().await else {
            panic!("expected a completion");
        };
        scheduler.handle_event(event);
        assert!(receiver.try_recv().unwrap().is_ok());
        assert!(scheduler.is_idle());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_request_per_destination_per_pass() {
        let key = DestinationKey::new("musicbrainz.org", 443);
        let Harness {
            mut scheduler,
            mut events,
            transport,
            ..
        } = harness(&ServiceConfig::default());

        let (_, mut first) = submit(&mut scheduler, &key, Priority::Normal);
        let (_, _second) = submit(&mut scheduler, &key, Priority::Normal);

        scheduler.run_pending();
        assert_eq!(scheduler.tracker.len(), 1);
        assert_eq!(scheduler.queues.len(), 1);
        assert_eq!(
            scheduler.dispatch_deadline(),
            Some(Instant::now() + Duration::from_secs(1))
        );

        let Some(Event::Completed { id, reply }) = events.recv().await else {
            panic!("expected a completion");
        };
        scheduler.process_reply(id, reply);
        assert!(first.try_recv().unwrap().is_ok());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unthrottled_destination_is_drained_quickly() {
        let mut config = ServiceConfig::default();
        let key = DestinationKey::new("coverartarchive.org", 443);
        config.request_intervals.insert(key.clone(), Duration::ZERO);
        let Harness { mut scheduler, .. } = harness(&config);

        for _ in 0..3 {
            let _ = submit(&mut scheduler, &key, Priority::Normal);
        }
        scheduler.run_pending();

        assert_eq!(scheduler.tracker.len(), 1);
        assert_eq!(scheduler.dispatch_deadline(), Some(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_work() {
        let key = DestinationKey::new("musicbrainz.org", 443);
        let Harness {
            mut scheduler,
            pending,
            ..
        } = harness(&ServiceConfig::default());

        let receivers: Vec<_> = (0..3)
            .map(|_| submit(&mut scheduler, &key, Priority::Normal).1)
            .collect();
        scheduler.run_pending();

        let summary = scheduler.shutdown();
        assert_eq!(
            summary,
            ShutdownSummary {
                aborted: 1,
                discarded: 2
            }
        );
        assert_eq!(*pending.borrow(), 0);
        assert!(scheduler.is_idle());
        assert!(scheduler.dispatch_deadline().is_none());
        for receiver in receivers {
            assert!(receiver.await.is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ids_are_unique() {
        let Harness { scheduler, .. } = harness(&ServiceConfig::default());
        let ids: Vec<TaskId> = (0..3).map(|_| scheduler.task_ids.next()).collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }
}
