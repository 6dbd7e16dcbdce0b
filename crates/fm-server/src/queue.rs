//! FIFO work queue shared by the connection tasks and one worker.
//!
//! Only push and pop hold the lock. Workers drain everything queued,
//! then wait for a push or the poll interval, whichever comes first.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

pub struct WorkQueue<T> {
    name: &'static str,
    items: Mutex<VecDeque<T>>,
    ready: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.ready.notify_one();
    }

    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Wait until something is pushed, or at most `max_wait`.
    ///
    /// A push that happened since the last wait returns immediately.
    pub async fn wait(&self, max_wait: Duration) {
        let _ = tokio::time::timeout(max_wait, self.ready.notified()).await;
    }
}
