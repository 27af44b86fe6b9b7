//! Queue adapter: durable, at-least-once task transport.
//!
//! Acknowledgement is explicit and happens only after a worker has
//! persisted its stage result and handed the job off (or marked it
//! terminal). The price is duplicate delivery, which workers tolerate by
//! deciding from persisted job state rather than message content.

mod memory;

pub use memory::MemoryQueue;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::job::TaskMessage;

/// Identifies one delivery for acknowledgement. Opaque to workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub queue: String,
    pub id: u64,
}

/// One delivered task plus its acknowledgement receipt.
#[derive(Debug)]
pub struct Delivery {
    pub task: TaskMessage,
    pub receipt: Receipt,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue for immediate delivery. The message survives until
    /// acknowledged; redelivery after the visibility timeout is possible.
    async fn enqueue(&self, queue: &str, task: &TaskMessage) -> Result<()>;

    /// Enqueue with a delivery delay (retry backoff).
    async fn enqueue_after(&self, queue: &str, task: &TaskMessage, delay: Duration) -> Result<()>;

    /// Wait for the next message on `queue`. A worker looping over `recv`
    /// is the consume stream: infinite, restartable only through
    /// redelivery of unacknowledged messages.
    async fn recv(&self, queue: &str) -> Result<Delivery>;

    /// Acknowledge a delivery. Unknown receipts are ignored: the message
    /// was already redelivered, and the duplicate will no-op downstream.
    async fn ack(&self, receipt: &Receipt) -> Result<()>;
}
