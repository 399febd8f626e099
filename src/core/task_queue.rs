//! Bounded (or unbounded) FIFO queue feeding the worker threads.
//!
//! The queue wraps a `crossbeam_channel` pair. The sending half lives behind a
//! lock so that [`TaskQueue::close`] can drop it: once every sender is gone,
//! `recv()` keeps handing out the remaining items and then reports
//! disconnection, which is exactly the "drain then signal closed" behaviour
//! workers rely on.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use super::ExecutorError;

/// An item the queue refused, handed back together with the reason.
#[derive(Debug)]
pub struct Rejected<T> {
    reason: ExecutorError,
    item: T,
}

impl<T> Rejected<T> {
    /// Why the item was refused (`QueueFull` or `PoolClosed`).
    pub const fn reason(&self) -> &ExecutorError {
        &self.reason
    }

    /// Recover the refused item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

/// Thread-safe FIFO of pending items with optional capacity bound.
pub struct TaskQueue<T> {
    tx: RwLock<Option<Sender<T>>>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> TaskQueue<T> {
    /// Create a queue. A `capacity` of `0` means unbounded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = if capacity == 0 {
            unbounded()
        } else {
            bounded(capacity)
        };
        Self {
            tx: RwLock::new(Some(tx)),
            rx,
            capacity,
        }
    }

    /// Append an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns the item inside [`Rejected`] with reason
    /// - `ExecutorError::QueueFull` if the queue is bounded and at capacity
    /// - `ExecutorError::PoolClosed` if [`close`](Self::close) was called
    pub fn enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        let tx = self.tx.read();
        let Some(tx) = tx.as_ref() else {
            return Err(Rejected {
                reason: ExecutorError::PoolClosed,
                item,
            });
        };
        tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => Rejected {
                reason: ExecutorError::QueueFull,
                item,
            },
            TrySendError::Disconnected(item) => Rejected {
                reason: ExecutorError::PoolClosed,
                item,
            },
        })
    }

    /// Block until an item is available.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub fn dequeue(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Stop accepting items. Already queued items remain available to
    /// [`dequeue`](Self::dequeue). Idempotent.
    pub fn close(&self) {
        self.tx.write().take();
    }

    /// Remove and return every item currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity (`0` = unbounded).
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new(0);
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        let drained: Vec<i32> = (0..5).filter_map(|_| queue.dequeue()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bounded_rejects_when_full() {
        let queue = TaskQueue::new(2);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        let rejected = queue.enqueue(3).unwrap_err();
        assert_eq!(rejected.reason(), &ExecutorError::QueueFull);
        assert_eq!(rejected.into_inner(), 3);

        assert_eq!(queue.dequeue(), Some(1));
        queue.enqueue(3).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_unbounded_never_rejects() {
        let queue = TaskQueue::new(0);
        for i in 0..10_000 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 10_000);
        assert_eq!(queue.capacity(), 0);
    }

    #[test]
    fn test_close_drains_then_signals() {
        let queue = TaskQueue::new(4);
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        let rejected = queue.enqueue("c").unwrap_err();
        assert_eq!(rejected.reason(), &ExecutorError::PoolClosed);
        assert_eq!(queue.dequeue(), Some("a"));
        assert_eq!(queue.dequeue(), Some("b"));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue = Arc::new(TaskQueue::<u32>::new(0));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = TaskQueue::new(0);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.drain(), vec![1, 2]);
        assert!(queue.is_empty());
    }
}
