use http::Method;
use url::Url;

use super::dispatch::Scheduler;
use super::queue::{RequestTask, TaskHandle};
use crate::builder::RequestDescriptor;
use crate::tracker::{InFlightRequest, RequestId};
use crate::transport::{ErrorCode, Reply, TransportError};
use crate::utils::url::{redact, urls_equivalent};
use crate::{DestinationKey, Document, Priority, Request, Response};

/// What to do with a finished exchange
enum Outcome {
    Deliver(Response),
    Follow(Request),
}

impl Scheduler {
    /// Turn a transport reply into exactly one of: a delivered response,
    /// or a redirected request queued in front of its destination.
    pub(crate) fn process_reply(&mut self, id: RequestId, reply: Reply) {
        let Some(in_flight) = self.tracker.resolve(id) else {
            log::error!("Request not found for {}", redact(&reply.url));
            return;
        };
        let InFlightRequest {
            descriptor,
            request,
            responder,
            ..
        } = in_flight;

        match self.classify(&descriptor, request, reply) {
            Outcome::Deliver(response) => {
                if responder.send(Ok(response)).is_err() {
                    log::debug!("Caller for {} is no longer waiting", redact(&descriptor.url));
                }
            }
            Outcome::Follow(request) => {
                let handle =
                    TaskHandle::new(self.task_ids.next(), request.destination.clone(), Priority::High);
                self.enqueue(&handle, RequestTask { request, responder }, true);
            }
        }
        self.schedule_count();
    }

    fn classify(&mut self, descriptor: &RequestDescriptor, request: Request, reply: Reply) -> Outcome {
        let Reply {
            url,
            status,
            reason,
            headers,
            body,
            redirect,
            from_cache,
            error,
        } = reply;

        let response = |document, error| Response {
            url: url.clone(),
            status,
            reason: reason.clone(),
            headers: headers.clone(),
            from_cache,
            document,
            error,
        };

        if let Some(error) = error {
            log::error!(
                "Network request error for {}: {} (HTTP code {})",
                redact(&url),
                error,
                status.map_or_else(|| "-".to_string(), |s| s.as_u16().to_string()),
            );
            return Outcome::Deliver(response(Document::Raw(body), Some(error)));
        }

        log::debug!(
            "Received reply for {}: HTTP {} ({}){}",
            redact(&url),
            status.map_or(0, |s| s.as_u16()),
            reason.as_deref().unwrap_or_default(),
            if from_cache { " (CACHED)" } else { "" }
        );

        if let Some(location) = redirect {
            return match self.follow(descriptor, request, &url, &location) {
                Ok(request) => Outcome::Follow(request),
                Err(error) => Outcome::Deliver(response(Document::Raw(body), Some(error))),
            };
        }

        let document = self.decode(request.parse_type.as_deref(), body);
        Outcome::Deliver(response(document, None))
    }

    /// Build the request for a redirect target, or the error that ends the chain
    fn follow(
        &mut self,
        descriptor: &RequestDescriptor,
        request: Request,
        url: &Url,
        location: &str,
    ) -> Result<Request, TransportError> {
        let target = url.join(location).map_err(|e| {
            log::error!("Invalid redirect target {location:?} from {}: {e}", redact(url));
            TransportError::new(ErrorCode::ProtocolFailure, e.to_string())
        })?;

        if urls_equivalent(&target, url) {
            log::error!("Redirect loop: {}", redact(url));
            return Err(TransportError::new(ErrorCode::RedirectLoop, "Redirect loop"));
        }

        let destination = DestinationKey::try_from(&target).map_err(|e| {
            log::error!("Cannot follow redirect to {}: {e}", redact(&target));
            TransportError::new(ErrorCode::ProtocolFailure, e.to_string())
        })?;
        log::debug!("Redirect to {} requested", redact(&target));

        self.rate_limiter
            .inherit_interval(&request.destination, &destination);

        let mut redirected = Request::new(Method::GET, destination, target.path());
        redirected.query = target.query_pairs().into_owned().collect();
        redirected.parse_type = request.parse_type;
        redirected.refresh = request.refresh;
        redirected.cache_load_control = descriptor.cache_load_control;
        Ok(redirected)
    }

    /// Run the registered parser, falling back to the raw body
    fn decode(&self, parse_type: Option<&str>, body: Vec<u8>) -> Document {
        let Some(tag) = parse_type else {
            return Document::Raw(body);
        };
        match self.parsers.parser_for(tag) {
            Ok(parser) => match parser.decode(&body) {
                Ok(document) => document,
                Err(e) => {
                    log::error!("Unable to parse the response. {e}");
                    Document::Raw(body)
                }
            },
            Err(e) => {
                log::error!("{e}");
                Document::Raw(body)
            }
        }
    }
}
