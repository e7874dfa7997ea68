use async_trait::async_trait;
use http::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::builder::RequestDescriptor;
use crate::transport::{Reply, Transport};
use crate::{ServiceBuilder, ServiceConfig, WebService};

#[macro_export]
/// Creates a mock web server, which responds with a predefined status when
/// handling any request
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::any()).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// A request as seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub(crate) descriptor: RequestDescriptor,
    pub(crate) at: Instant,
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Reply),
    Hang,
}

/// In-memory transport with scripted replies per URL.
///
/// Unscripted URLs answer `200 OK` with an empty body. The last scripted
/// reply of a URL is repeated once the others are used up.
#[derive(Debug)]
pub(crate) struct MockTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sent: Mutex<Vec<Sent>>,
    sent_count: watch::Sender<usize>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            sent_count: watch::Sender::new(0),
        }
    }

    /// Answer requests for `url` with `reply`
    pub(crate) fn respond(&self, url: &str, reply: Reply) {
        self.push(url, Scripted::Reply(reply));
    }

    /// Never answer requests for `url`
    pub(crate) fn hang(&self, url: &str) {
        self.push(url, Scripted::Hang);
    }

    fn push(&self, url: &str, scripted: Scripted) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, url: &str) -> Option<Scripted> {
        let mut script = self.script.lock().unwrap();
        let queue = script.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    /// Everything sent so far, in order
    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` requests were sent
    pub(crate) async fn wait_for_sent(&self, count: usize) {
        let mut receiver = self.sent_count.subscribe();
        receiver.wait_for(|sent| *sent >= count).await.unwrap();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: RequestDescriptor) -> Reply {
        let url = request.url.clone();
        let scripted = self.next(url.as_str());
        self.sent.lock().unwrap().push(Sent {
            descriptor: request,
            at: Instant::now(),
        });
        self.sent_count.send_modify(|count| *count += 1);

        match scripted {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Hang) => std::future::pending().await,
            None => Reply::new(url).with_status(StatusCode::OK),
        }
    }
}

/// Start a service on top of `transport`
pub(crate) fn mock_service(transport: &Arc<MockTransport>, config: ServiceConfig) -> WebService {
    ServiceBuilder::builder()
        .config(config)
        .transport(transport.clone())
        .build()
        .start()
        .unwrap()
}
