//! Blocking Queue
//!
//! Unbounded FIFO used as the hand-off between application code and the
//! socket workers. `enqueue` never blocks; `dequeue` parks the caller
//! until an item is available.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Unbounded multi-producer, multi-consumer FIFO with blocking dequeue
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake one waiting consumer
    pub fn enqueue(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        drop(items);
        self.available.notify_one();
    }

    /// Remove the oldest item, blocking while the queue is empty
    pub fn dequeue(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.available.wait(&mut items);
        }
    }

    /// Number of queued items (a snapshot; may be stale immediately)
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Drop every queued item
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len())
            .finish()
    }
}
