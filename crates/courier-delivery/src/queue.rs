//! The shared delivery queue.
//!
//! The queue is the only mutable state shared between workers. Every pop and
//! push happens under one mutex held for the duration of that operation
//! alone, never across network I/O, so a message removed by one worker is
//! never visible to another.

use courier_protocol::Message;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Queue rejection reasons.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at its configured capacity
    #[error("Queue is full ({0} messages)")]
    Full(usize),

    /// The queue no longer accepts enqueues (shutdown in progress)
    #[error("Queue is closed")]
    Closed,
}

struct QueueInner {
    messages: VecDeque<Message>,
    closed: bool,
}

/// Bounded FIFO of messages awaiting delivery.
///
/// Long-lived: created at startup and outliving any individual worker.
pub struct SharedQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl SharedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                messages: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue a message at the tail.
    pub async fn push(&self, msg: Message) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(QueueError::Closed);
        }
        if inner.messages.len() >= self.capacity {
            return Err(QueueError::Full(self.capacity));
        }
        inner.messages.push_back(msg);
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the head message, or None when the queue is currently empty.
    pub async fn pop(&self) -> Option<Message> {
        self.inner.lock().await.messages.pop_front()
    }

    /// Pop the head message, waiting for one to arrive. Returns None once
    /// the queue is closed and drained.
    pub async fn pop_wait(&self) -> Option<Message> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(msg) = inner.messages.pop_front() {
                    return Some(msg);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Return a failed batch to the head of the queue, preserving its order
    /// ahead of everything already queued.
    ///
    /// Recovery must never lose messages, so this bypasses the capacity
    /// bound and the closed flag.
    pub async fn requeue_front(&self, batch: Vec<Message>) {
        if batch.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        debug!(count = batch.len(), "requeueing messages");
        for msg in batch.into_iter().rev() {
            inner.messages.push_front(msg);
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Stop accepting enqueues and wake every waiting worker.
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove and return everything still queued. Used at shutdown to report
    /// undelivered messages.
    pub async fn drain(&self) -> Vec<Message> {
        let mut inner = self.inner.lock().await;
        inner.messages.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_protocol::{DeviceToken, TOKEN_LEN};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn msg(id: u32) -> Message {
        let token = DeviceToken::try_from(&[1u8; TOKEN_LEN][..]).unwrap();
        Message::new(id, token, vec![])
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = SharedQueue::new(16);
        for id in 1..=3 {
            queue.push(msg(id)).await.unwrap();
        }
        assert_eq!(queue.pop().await.unwrap().id, 1);
        assert_eq!(queue.pop().await.unwrap().id, 2);
        assert_eq!(queue.pop().await.unwrap().id, 3);
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let queue = SharedQueue::new(2);
        queue.push(msg(1)).await.unwrap();
        queue.push(msg(2)).await.unwrap();
        assert_eq!(queue.push(msg(3)).await, Err(QueueError::Full(2)));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_push() {
        let queue = SharedQueue::new(16);
        queue.close().await;
        assert_eq!(queue.push(msg(1)).await, Err(QueueError::Closed));
        assert!(queue.is_closed().await);
    }

    #[tokio::test]
    async fn test_requeue_front_preserves_order() {
        let queue = SharedQueue::new(16);
        queue.push(msg(10)).await.unwrap();
        queue.requeue_front(vec![msg(1), msg(2), msg(3)]).await;

        assert_eq!(queue.pop().await.unwrap().id, 1);
        assert_eq!(queue.pop().await.unwrap().id, 2);
        assert_eq!(queue.pop().await.unwrap().id, 3);
        assert_eq!(queue.pop().await.unwrap().id, 10);
    }

    #[tokio::test]
    async fn test_requeue_ignores_capacity_and_close() {
        let queue = SharedQueue::new(1);
        queue.push(msg(1)).await.unwrap();
        queue.close().await;
        queue.requeue_front(vec![msg(2), msg(3)]).await;
        assert_eq!(queue.len().await, 3);
    }

    #[tokio::test]
    async fn test_pop_wait_returns_none_when_closed_and_drained() {
        let queue = Arc::new(SharedQueue::new(16));
        queue.push(msg(1)).await.unwrap();
        queue.close().await;

        assert_eq!(queue.pop_wait().await.unwrap().id, 1);
        assert!(queue.pop_wait().await.is_none());
    }

    #[tokio::test]
    async fn test_pop_wait_wakes_on_push() {
        let queue = Arc::new(SharedQueue::new(16));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop_wait().await })
        };
        // Give the waiter time to park
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.push(msg(7)).await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_concurrent_pops_are_disjoint_and_complete() {
        const MESSAGES: u32 = 200;
        const WORKERS: usize = 4;

        let queue = Arc::new(SharedQueue::new(MESSAGES as usize));
        for id in 1..=MESSAGES {
            queue.push(msg(id)).await.unwrap();
        }
        queue.close().await;

        let mut handles = Vec::new();
        for _ in 0..WORKERS {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(m) = queue.pop_wait().await {
                    got.push(m.id);
                    tokio::task::yield_now().await;
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        // Every message delivered exactly once across workers
        let unique: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(all.len(), MESSAGES as usize);
        assert_eq!(unique.len(), MESSAGES as usize);
    }

    #[tokio::test]
    async fn test_drain_empties_queue() {
        let queue = SharedQueue::new(16);
        for id in 1..=5 {
            queue.push(msg(id)).await.unwrap();
        }
        let drained = queue.drain().await;
        assert_eq!(drained.len(), 5);
        assert!(queue.is_empty().await);
    }
}
