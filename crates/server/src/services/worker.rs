//! Order processing.
//!
//! [`OrderWorker::process_next`] advances the head of the queue to
//! `completed`. It runs on demand from the admin endpoint and on a timer
//! from the task started by [`OrderWorker::spawn`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use cartwheel_core::OrderStatus;

use super::order_queue::{OrderJob, OrderQueue};
use crate::db::{RepositoryError, Store};

/// Drains the order queue.
///
/// Clones share one drain lock, so the admin endpoint and the timer task
/// never have two jobs in flight at once.
#[derive(Clone)]
pub struct OrderWorker {
    store: Arc<dyn Store>,
    queue: Arc<OrderQueue>,
    drain: Arc<Mutex<()>>,
}

impl OrderWorker {
    /// Create a worker over `queue`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<OrderQueue>) -> Self {
        Self {
            store,
            queue,
            drain: Arc::new(Mutex::new(())),
        }
    }

    /// Dequeue the head job and mark its order completed.
    ///
    /// Returns `Ok(None)` when the queue is empty. Concurrent callers are
    /// served one at a time, so orders complete in placement order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the status update fails. The job is put
    /// back at the head of the queue first.
    #[instrument(skip(self))]
    pub async fn process_next(&self) -> Result<Option<OrderJob>, RepositoryError> {
        // Held from dequeue until the job is completed or back at the head
        let _drain = self.drain.lock().await;
        let Some(job) = self.queue.dequeue() else {
            return Ok(None);
        };

        match self
            .store
            .update_order_status(job.order_id, OrderStatus::Completed)
            .await
        {
            Ok(true) => {
                info!(order_id = %job.order_id, remaining = self.queue.size(), "Order completed");
            }
            Ok(false) => {
                warn!(order_id = %job.order_id, "Queued order no longer exists, dropping job");
            }
            Err(err) => {
                error!(order_id = %job.order_id, error = %err, "Order processing failed, requeueing");
                self.queue.requeue_front(job);
                return Err(err);
            }
        }

        Ok(Some(job))
    }

    /// Run [`Self::process_next`] every `period` until `shutdown` flips to `true`.
    ///
    /// Each tick processes at most one job, and a failed tick leaves its job
    /// at the head for the next one.
    #[must_use]
    pub fn spawn(self, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(period_secs = period.as_secs_f64(), "Starting order worker");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick completes immediately

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.process_next().await {
                            Ok(Some(_)) | Err(_) => {}
                            Ok(None) => debug!("Order queue empty"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Order worker stopped");
        })
    }
}
