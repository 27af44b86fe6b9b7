//! In-process broker for tests and single-node deployments.
//!
//! Messages cross the boundary as serialized JSON, the same payloads a
//! networked broker would carry. Unacknowledged deliveries return to the
//! ready queue once their visibility deadline passes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::job::TaskMessage;

use super::{Delivery, Receipt, TaskQueue};

const DEFAULT_VISIBILITY: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct Entry {
    payload: String,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Entry>,
    /// Messages waiting out a backoff delay, with their due time.
    delayed: Vec<(Instant, Entry)>,
    /// Delivered but unacknowledged, keyed by delivery id, with their
    /// redelivery deadline. Each delivery gets a fresh id, so a stale
    /// receipt cannot release a redelivered copy's claim.
    inflight: HashMap<u64, (Instant, Entry)>,
    notify: Arc<Notify>,
}

impl QueueState {
    /// Move due delayed messages and expired in-flight deliveries back to
    /// ready. Returns the earliest future wake-up, if any.
    fn promote(&mut self, now: Instant) -> Option<Instant> {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].0 <= now {
                let (_, entry) = self.delayed.swap_remove(i);
                self.ready.push_back(entry);
            } else {
                i += 1;
            }
        }

        let expired: Vec<u64> = self
            .inflight
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some((_, entry)) = self.inflight.remove(&id) {
                self.ready.push_back(entry);
            }
        }

        self.delayed
            .iter()
            .map(|(due, _)| *due)
            .chain(self.inflight.values().map(|(deadline, _)| *deadline))
            .min()
    }
}

/// In-memory queue broker.
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    visibility: Duration,
    next_id: std::sync::atomic::AtomicU64,
}

impl MemoryQueue {
    pub fn new(visibility: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            visibility,
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn entry(&self, task: &TaskMessage) -> Result<Entry> {
        let payload = serde_json::to_string(task).context("serialize task message")?;
        Ok(Entry { payload })
    }

    fn delivery_id(&self) -> u64 {
        self.next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, task: &TaskMessage) -> Result<()> {
        let entry = self.entry(task)?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        state.ready.push_back(entry);
        state.notify.notify_one();
        Ok(())
    }

    async fn enqueue_after(&self, queue: &str, task: &TaskMessage, delay: Duration) -> Result<()> {
        let entry = self.entry(task)?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        state.delayed.push((Instant::now() + delay, entry));
        state.notify.notify_one();
        Ok(())
    }

    async fn recv(&self, queue: &str) -> Result<Delivery> {
        loop {
            let (notify, wake_at) = {
                let mut queues = self.queues.lock().await;
                let state = queues.entry(queue.to_string()).or_default();
                let now = Instant::now();
                let wake_at = state.promote(now);

                while let Some(entry) = state.ready.pop_front() {
                    let task: TaskMessage = match serde_json::from_str(&entry.payload) {
                        Ok(task) => task,
                        Err(e) => {
                            // Unparseable payloads are dropped, not wedged.
                            tracing::warn!(queue = %queue, error = %e, "Dropping malformed task message");
                            continue;
                        }
                    };
                    let id = self.delivery_id();
                    state
                        .inflight
                        .insert(id, (now + self.visibility, entry));
                    // Chain the wake-up so a second ready message is not
                    // stranded behind a single notify permit.
                    if !state.ready.is_empty() {
                        state.notify.notify_one();
                    }
                    return Ok(Delivery {
                        task,
                        receipt: Receipt {
                            queue: queue.to_string(),
                            id,
                        },
                    });
                }

                (state.notify.clone(), wake_at)
            };

            let notified = notify.notified();
            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn ack(&self, receipt: &Receipt) -> Result<()> {
        let mut queues = self.queues.lock().await;
        if let Some(state) = queues.get_mut(&receipt.queue) {
            state.inflight.remove(&receipt.id);
        }
        Ok(())
    }
}
