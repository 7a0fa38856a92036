//! FIFO buffer of placed orders awaiting processing.
//!
//! A job carries everything a worker needs to advance the order, because by
//! the time it is dequeued the cart it came from has already been cleared.
//!
//! The queue lives in memory only. Jobs still queued when the process exits
//! are lost; their orders stay in `processing` status in the store.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use cartwheel_core::{Money, OrderId, PaymentId, UserId};

use crate::models::OrderLine;

/// One placed order awaiting processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderJob {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_id: PaymentId,
    pub total_amount: Money,
    pub items: Vec<OrderLine>,
    pub enqueued_at: DateTime<Utc>,
}

/// A queued job together with its 1-based position from the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedJob {
    #[serde(flatten)]
    pub job: OrderJob,
    pub position: usize,
}

/// Strict FIFO queue of [`OrderJob`]s guarded by a single lock.
#[derive(Default)]
pub struct OrderQueue {
    jobs: Mutex<VecDeque<OrderJob>>,
}

impl OrderQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail and return its 1-based position.
    pub fn enqueue(&self, job: OrderJob) -> usize {
        let order_id = job.order_id;
        let mut jobs = self.jobs.lock();
        jobs.push_back(job);
        let position = jobs.len();
        info!(order_id = %order_id, queue_len = position, "Order added to processing queue");
        position
    }

    /// Remove and return the head job.
    pub fn dequeue(&self) -> Option<OrderJob> {
        let mut jobs = self.jobs.lock();
        let job = jobs.pop_front();
        if let Some(job) = &job {
            debug!(order_id = %job.order_id, queue_len = jobs.len(), "Order dequeued");
        }
        job
    }

    /// Put a dequeued job back at the head.
    ///
    /// Used when processing failed upstream, so the job keeps its place ahead
    /// of everything enqueued after it.
    pub fn requeue_front(&self, job: OrderJob) {
        let order_id = job.order_id;
        let mut jobs = self.jobs.lock();
        jobs.push_front(job);
        info!(order_id = %order_id, queue_len = jobs.len(), "Order returned to head of queue");
    }

    /// The head job, without removing it.
    #[must_use]
    pub fn peek_front(&self) -> Option<OrderJob> {
        self.jobs.lock().front().cloned()
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn size(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the queue holds no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Every queued job in FIFO order with its 1-based position.
    ///
    /// Reads under the queue lock without removing anything, so concurrent
    /// callers never observe a partially drained queue.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        self.jobs
            .lock()
            .iter()
            .enumerate()
            .map(|(index, job)| QueuedJob {
                job: job.clone(),
                position: index + 1,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn job(order: i32) -> OrderJob {
        OrderJob {
            order_id: OrderId::new(order),
            user_id: UserId::new(1),
            payment_id: PaymentId::new(order),
            total_amount: Money::from_cents(1000),
            items: vec![],
            enqueued_at: Utc::now(),
        }
    }

    fn ids(snapshot: &[QueuedJob]) -> Vec<(i32, usize)> {
        snapshot
            .iter()
            .map(|q| (q.job.order_id.as_i32(), q.position))
            .collect()
    }

    #[test]
    fn test_dequeue_in_enqueue_order() {
        let queue = OrderQueue::new();
        for order in 1..=5 {
            queue.enqueue(job(order));
        }
        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|j| j.order_id.as_i32())
            .collect();
        assert_eq!(drained, vec![1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_reports_position() {
        let queue = OrderQueue::new();
        assert_eq!(queue.enqueue(job(1)), 1);
        assert_eq!(queue.enqueue(job(2)), 2);
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn test_dequeue_then_snapshot() {
        let queue = OrderQueue::new();
        queue.enqueue(job(1));
        queue.enqueue(job(2));
        queue.enqueue(job(3));

        assert_eq!(queue.dequeue().unwrap().order_id, OrderId::new(1));
        assert_eq!(ids(&queue.snapshot()), vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let queue = OrderQueue::new();
        queue.enqueue(job(10));
        queue.enqueue(job(20));

        let first = queue.snapshot();
        let second = queue.snapshot();
        assert_eq!(first, second);
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.peek_front().unwrap().order_id, OrderId::new(10));
    }

    #[test]
    fn test_empty_queue() {
        let queue = OrderQueue::new();
        assert!(queue.dequeue().is_none());
        assert!(queue.peek_front().is_none());
        assert!(queue.snapshot().is_empty());
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn test_requeue_front_restores_head() {
        let queue = OrderQueue::new();
        queue.enqueue(job(1));
        queue.enqueue(job(2));

        let head = queue.dequeue().unwrap();
        queue.requeue_front(head);
        assert_eq!(ids(&queue.snapshot()), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_snapshot_during_concurrent_traffic_is_always_ordered() {
        let queue = Arc::new(OrderQueue::new());
        for order in 0..200 {
            queue.enqueue(job(order));
        }

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for order in 200..400 {
                    queue.enqueue(job(order));
                }
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for _ in 0..150 {
                    queue.dequeue();
                }
            })
        };

        for _ in 0..50 {
            let snapshot = queue.snapshot();
            let positions: Vec<_> = snapshot.iter().map(|q| q.position).collect();
            let expected: Vec<_> = (1..=snapshot.len()).collect();
            assert_eq!(positions, expected);
            assert!(
                snapshot
                    .windows(2)
                    .all(|w| w[0].job.order_id < w[1].job.order_id)
            );
        }

        producer.join().unwrap();
        consumer.join().unwrap();
        assert_eq!(queue.size(), 250);
    }
}
