//! Tests for the task queue

use prometheus_executor::core::{ExecutorError, TaskQueue};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_fifo_order() {
    let queue = TaskQueue::new(0);
    for i in 0..5 {
        queue.enqueue(i).unwrap();
    }
    let drained: Vec<i32> = std::iter::from_fn(|| {
        if queue.is_empty() {
            None
        } else {
            queue.dequeue()
        }
    })
    .collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_bounded_queue_hands_back_rejected_item() {
    let queue = TaskQueue::new(1);
    queue.enqueue("first").unwrap();

    let rejected = queue.enqueue("second").unwrap_err();
    assert_eq!(rejected.reason(), &ExecutorError::QueueFull);
    assert_eq!(rejected.into_inner(), "second");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.capacity(), 1);
}

#[test]
fn test_close_drains_then_signals() {
    let queue = TaskQueue::new(0);
    queue.enqueue(1).unwrap();
    queue.enqueue(2).unwrap();
    queue.close();
    queue.close();

    assert!(queue.is_closed());
    let rejected = queue.enqueue(3).unwrap_err();
    assert_eq!(rejected.reason(), &ExecutorError::PoolClosed);

    assert_eq!(queue.dequeue(), Some(1));
    assert_eq!(queue.dequeue(), Some(2));
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn test_close_wakes_blocked_consumer() {
    let queue = Arc::new(TaskQueue::<u8>::new(0));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.dequeue())
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();
    assert_eq!(consumer.join().unwrap(), None);
}

#[test]
fn test_drain_empties_queue() {
    let queue = TaskQueue::new(4);
    for i in 0..3 {
        queue.enqueue(i).unwrap();
    }
    assert_eq!(queue.drain(), vec![0, 1, 2]);
    assert!(queue.is_empty());
}
