use std::collections::HashMap;
use tokio::task::AbortHandle;

use crate::Request;
use crate::builder::RequestDescriptor;
use crate::scheduler::Responder;

/// Identifies one transmission.
///
/// A redirect is a new transmission and gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RequestId(u64);

/// Everything needed to finish a request once its reply arrives
#[derive(Debug)]
pub(crate) struct InFlightRequest {
    pub(crate) descriptor: RequestDescriptor,
    pub(crate) request: Request,
    pub(crate) responder: Responder,
    pub(crate) abort: AbortHandle,
}

/// Requests that were handed to the transport and have not been answered.
#[derive(Debug, Default)]
pub(crate) struct PendingRequestTracker {
    next_id: u64,
    in_flight: HashMap<RequestId, InFlightRequest>,
}

impl PendingRequestTracker {
    /// Reserve the id for the next transmission
    pub(crate) fn next_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn register(&mut self, id: RequestId, request: InFlightRequest) {
        self.in_flight.insert(id, request);
    }

    /// Remove the entry for `id`. Each entry resolves at most once.
    pub(crate) fn resolve(&mut self, id: RequestId) -> Option<InFlightRequest> {
        self.in_flight.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Abort every transmission and drop its responder.
    ///
    /// Returns how many requests were aborted.
    pub(crate) fn abort_all(&mut self) -> usize {
        let count = self.in_flight.len();
        for (_, request) in self.in_flight.drain() {
            request.abort.abort();
        }
        count
    }
}
