//! Per-subscriber mailbox
//!
//! A bounded FIFO of rendered payloads. The registry owns the mailbox for
//! as long as its identity is registered; cloned handles share the queue.
//!
//! Closing a mailbox (logout or re-registration) releases everybody waiting
//! on it: a blocked `recv` returns `None`, a blocked `deliver` returns
//! `DeliveryError::Closed`. Payloads still queued at that point are dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::DeliveryError;

#[derive(Debug, Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<String>,
    /// Shared so concurrent `Receive` calls for one identity take turns
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    closed: CancellationToken,
}

impl Mailbox {
    /// Create an empty mailbox holding at most `capacity` payloads (min 1)
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a payload, waiting for room if the mailbox is full
    pub async fn deliver(&self, payload: String) -> Result<(), DeliveryError> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(DeliveryError::Closed),
            res = self.sender.send(payload) => res.map_err(|_| DeliveryError::Closed),
        }
    }

    /// Enqueue a payload without waiting
    pub fn try_deliver(&self, payload: String) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Wait for the next payload
    ///
    /// Returns `None` once the mailbox is closed.
    pub async fn recv(&self) -> Option<String> {
        let closed = &self.closed;
        tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            payload = async {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            } => payload,
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of payloads waiting to be received
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}
