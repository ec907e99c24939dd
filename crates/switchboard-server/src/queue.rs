//! Notification queue seam.
//!
//! The gateway consumes three named channels (call intake, SMS intake,
//! post-call processing) through the [`Queue`] trait. Delivery semantics are
//! the transport's problem: messages arrive at least once, and redelivery or
//! backoff after a handler failure happens outside this process. Handlers
//! must therefore tolerate seeing the same logical event more than once.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors that can occur when talking to a queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue '{name}' rejected message: {reason}")]
    Send { name: String, reason: String },
}

/// One message pulled from a queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub content: String,
}

/// A named notification channel.
#[async_trait]
pub trait Queue: Send + Sync {
    /// The channel name this queue is bound to.
    fn name(&self) -> &str;

    /// Enqueues a message.
    async fn send(&self, content: String) -> Result<(), QueueError>;

    /// Fetches the next message, waiting until one is available. Returns
    /// `None` only when the transport has shut down.
    async fn receive(&self) -> Option<QueueMessage>;
}

/// In-process queue backed by a bounded channel.
///
/// Used in local mode and tests. Capacity is bounded so a stalled consumer
/// back-pressures producers instead of growing memory.
pub struct MemoryQueue {
    name: String,
    tx: mpsc::Sender<String>,
    rx: Mutex<mpsc::Receiver<String>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        Arc::new(Self {
            name: name.into(),
            tx,
            rx: Mutex::new(rx),
        })
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, content: String) -> Result<(), QueueError> {
        self.tx.send(content).await.map_err(|e| QueueError::Send {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    async fn receive(&self) -> Option<QueueMessage> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.map(|content| QueueMessage { content })
    }
}

/// The three channels the dispatch workers consume.
#[derive(Clone)]
pub struct Queues {
    pub call: Arc<dyn Queue>,
    pub sms: Arc<dyn Queue>,
    pub post: Arc<dyn Queue>,
}

impl Queues {
    /// Builds the in-memory channel set from configuration.
    pub fn in_memory(config: &crate::config::QueueConfig) -> Self {
        Self {
            call: MemoryQueue::new(&config.call_name, config.capacity),
            sms: MemoryQueue::new(&config.sms_name, config.capacity),
            post: MemoryQueue::new(&config.post_name, config.capacity),
        }
    }
}
