use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Responder;
use crate::{DestinationKey, Priority, Request};

/// Unique id of a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Shared generator for [`TaskId`]s.
///
/// Ids are handed out by the submitting side so a [`TaskHandle`] is
/// available before the scheduler has seen the task.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskIds(Arc<AtomicU64>);

impl TaskIds {
    pub(crate) fn next(&self) -> TaskId {
        TaskId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies a queued task for cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    id: TaskId,
    destination: DestinationKey,
    priority: Priority,
}

impl TaskHandle {
    pub(crate) const fn new(id: TaskId, destination: DestinationKey, priority: Priority) -> Self {
        Self {
            id,
            destination,
            priority,
        }
    }

    /// The task id
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The destination queue the task was placed in
    #[must_use]
    pub const fn destination(&self) -> &DestinationKey {
        &self.destination
    }

    /// The priority tier the task was placed in
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }
}

/// A request together with the channel its outcome is delivered on
#[derive(Debug)]
pub(crate) struct RequestTask {
    pub(crate) request: Request,
    pub(crate) responder: Responder,
}

#[derive(Debug)]
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) task: RequestTask,
}

type DestinationQueues = HashMap<DestinationKey, VecDeque<QueuedTask>>;

/// FIFO queues keyed by priority tier and destination.
///
/// Queues are created on first use and pruned once empty.
#[derive(Debug, Default)]
pub(crate) struct QueueTable {
    tiers: BTreeMap<Priority, DestinationQueues>,
}

impl QueueTable {
    /// Append a task, or put it in front of its queue if `important`
    pub(crate) fn push(&mut self, handle: &TaskHandle, task: RequestTask, important: bool) {
        let queue = self
            .tiers
            .entry(handle.priority)
            .or_default()
            .entry(handle.destination.clone())
            .or_default();
        let entry = QueuedTask {
            id: handle.id,
            task,
        };
        if important {
            queue.push_front(entry);
        } else {
            queue.push_back(entry);
        }
    }

    /// Remove the task identified by `handle`, wherever it sits in its queue
    pub(crate) fn remove(&mut self, handle: &TaskHandle) -> Option<QueuedTask> {
        let queues = self.tiers.get_mut(&handle.priority)?;
        let queue = queues.get_mut(&handle.destination)?;
        let index = queue.iter().position(|entry| entry.id == handle.id)?;
        let removed = queue.remove(index);
        if queue.is_empty() {
            queues.remove(&handle.destination);
        }
        if queues.is_empty() {
            self.tiers.remove(&handle.priority);
        }
        removed
    }

    pub(crate) fn pop_front(
        &mut self,
        priority: Priority,
        destination: &DestinationKey,
    ) -> Option<QueuedTask> {
        self.tiers
            .get_mut(&priority)?
            .get_mut(destination)?
            .pop_front()
    }

    pub(crate) fn queue_len(&self, priority: Priority, destination: &DestinationKey) -> usize {
        self.tiers
            .get(&priority)
            .and_then(|queues| queues.get(destination))
            .map_or(0, VecDeque::len)
    }

    /// Priority tiers with queued work, highest first
    pub(crate) fn priorities(&self) -> Vec<Priority> {
        self.tiers.keys().rev().copied().collect()
    }

    /// Destinations with a queue in `priority`
    pub(crate) fn destinations(&self, priority: Priority) -> Vec<DestinationKey> {
        self.tiers
            .get(&priority)
            .map(|queues| queues.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop empty queues and tiers
    pub(crate) fn prune(&mut self) {
        self.tiers.retain(|_, queues| {
            queues.retain(|_, queue| !queue.is_empty());
            !queues.is_empty()
        });
    }

    /// Total number of queued tasks
    pub(crate) fn len(&self) -> usize {
        self.tiers
            .values()
            .flat_map(HashMap::values)
            .map(VecDeque::len)
            .sum()
    }

    /// Discard all tasks, returning how many were dropped
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.len();
        self.tiers.clear();
        count
    }
}
