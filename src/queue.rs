//! A bounded read-ahead queue of serialized messages between the
//! storage-loading producer and the publish consumer. Polling the queue
//! from the consumer side is acceptable here, which keeps this to a plain
//! mutex-guarded deque rather than a lock-free ring buffer.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::message::SerializedMessage;

pub struct MessageQueue {
    inner: Mutex<VecDeque<SerializedMessage>>,
    capacity: usize,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Producer-only.
    pub fn enqueue(&self, message: SerializedMessage) {
        self.lock().push_back(message);
    }

    /// Consumer-only, non-destructive. Safe to call while the producer
    /// concurrently enqueues: both sides only ever touch the shared mutex.
    pub fn peek(&self) -> Option<SerializedMessage> {
        self.lock().front().cloned()
    }

    /// Consumer-only (except during `seek`, which first takes the reader
    /// mutex so the consumer is guaranteed to be outside its own critical
    /// section). Returns whether an element was removed.
    pub fn pop(&self) -> bool {
        self.lock().pop_front().is_some()
    }

    /// Loose/approximate by design; callers must not rely on an exact
    /// value under concurrent access.
    pub fn size_approx(&self) -> usize {
        self.lock().len()
    }

    /// A poisoned queue mutex (one side panicked mid-operation on a plain
    /// `VecDeque` push/pop) carries no broken invariant worth losing the
    /// buffered messages over; recover the guard rather than cascading the
    /// panic into the other side of the pipeline.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SerializedMessage>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_peek_then_pop() {
        let queue = MessageQueue::new(4);
        assert_eq!(queue.peek(), None);
        queue.enqueue(SerializedMessage::new("/a", Vec::<u8>::new(), 10));
        let peeked = queue.peek().unwrap();
        assert_eq!(peeked.time_stamp, 10);
        assert_eq!(queue.size_approx(), 1);
        assert!(queue.pop());
        assert_eq!(queue.size_approx(), 0);
        assert!(!queue.pop());
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = MessageQueue::new(8);
        for t in [10, 20, 30] {
            queue.enqueue(SerializedMessage::new("/a", Vec::<u8>::new(), t));
        }
        let mut seen = Vec::new();
        while let Some(msg) = queue.peek() {
            seen.push(msg.time_stamp);
            queue.pop();
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }
}
