use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::request::MaterializedRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueStatus {
    Idle,
    Running,
    Stopped,
}

/// FIFO lane for one queue key. `running` is true while a drain task owns
/// the lane; the entry being executed is no longer in `entries`.
#[derive(Debug, Default)]
pub(crate) struct Queue {
    entries: VecDeque<Arc<MaterializedRequest>>,
    running: bool,
    stopped: bool,
}

impl Queue {
    /// Append. Returns `true` when the caller must start a drain task.
    pub(crate) fn push(&mut self, request: Arc<MaterializedRequest>) -> bool {
        self.entries.push_back(request);
        self.claim()
    }

    /// Next entry for the drain task, or `None` after marking the lane idle.
    pub(crate) fn next_entry(&mut self) -> Option<Arc<MaterializedRequest>> {
        if self.stopped {
            self.running = false;
            return None;
        }
        let next = self.entries.pop_front();
        if next.is_none() {
            self.running = false;
        }
        next
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }

    /// Resume. Returns `true` when the caller must start a drain task.
    pub(crate) fn start(&mut self) -> bool {
        self.stopped = false;
        self.claim()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Arc<MaterializedRequest>) -> bool) {
        self.entries.retain(keep);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_disposable(&self) -> bool {
        !self.running && !self.stopped && self.entries.is_empty()
    }

    pub(crate) fn status(&self) -> QueueStatus {
        if self.stopped {
            QueueStatus::Stopped
        } else if self.running {
            QueueStatus::Running
        } else {
            QueueStatus::Idle
        }
    }

    fn claim(&mut self) -> bool {
        if self.running || self.stopped || self.entries.is_empty() {
            return false;
        }
        self.running = true;
        true
    }
}
