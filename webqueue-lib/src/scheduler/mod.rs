//! The single-owner request scheduler.
//!
//! All queue, rate limit and in-flight state lives in one [`Scheduler`]
//! driven by one task. Callers talk to it through [`Command`]s, while
//! spawned network and token futures report back through [`Event`]s.
//! Nothing is shared and nothing is locked.

use secrecy::SecretString;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::tracker::RequestId;
use crate::transport::Reply;
use crate::{DestinationKey, Response, Result};

mod dispatch;
mod queue;
mod reply;
mod timer;

pub(crate) use dispatch::{Scheduler, SchedulerParts};
pub use queue::{TaskHandle, TaskId};
pub(crate) use queue::{RequestTask, TaskIds};

/// Delivers the outcome of a task to its caller, exactly once
pub(crate) type Responder = oneshot::Sender<Result<Response>>;

/// Counts of work discarded by a shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// In-flight requests that were aborted
    pub aborted: usize,
    /// Queued tasks that were never sent
    pub discarded: usize,
}

/// Requests from service handles
#[derive(Debug)]
pub(crate) enum Command {
    Enqueue {
        handle: TaskHandle,
        task: RequestTask,
        important: bool,
    },
    Cancel(TaskHandle),
    SetRequestInterval(DestinationKey, Duration),
    Shutdown(oneshot::Sender<ShutdownSummary>),
}

/// Completions of futures spawned by the scheduler
#[derive(Debug)]
pub(crate) enum Event {
    /// A token lookup finished and the request can be sent
    Authorized {
        task: RequestTask,
        token: Option<SecretString>,
        generation: u64,
    },
    /// The transport answered
    Completed { id: RequestId, reply: Reply },
}

/// Run the scheduler until every handle is gone and no work is left
pub(crate) async fn run(
    mut scheduler: Scheduler,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<Event>,
) {
    let mut detached = false;
    loop {
        if detached && scheduler.is_idle() {
            break;
        }

        let dispatch_at = scheduler.dispatch_deadline();
        let count_at = scheduler.count_deadline();

        tokio::select! {
            biased;

            command = commands.recv(), if !detached => match command {
                Some(command) => scheduler.handle_command(command),
                None => {
                    log::debug!("All service handles dropped, draining remaining requests");
                    detached = true;
                }
            },
            Some(event) = events.recv() => scheduler.handle_event(event),
            () = timer::sleep_until(dispatch_at) => scheduler.run_pending(),
            () = timer::sleep_until(count_at) => scheduler.count_pending(),
        }
    }
    log::debug!("Scheduler stopped");
}
