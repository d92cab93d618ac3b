use parley_core::{MemberId, SignalMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("transport closed")]
    Closed,
    #[error("transport saturated")]
    TimedOut,
}

/// Sending half of one member's signaling connection.
///
/// The receiving half is drained by the websocket writer task; once the
/// connection goes away every delivery fails with [`DeliveryError::Closed`].
/// A room that can no longer reach the member evicts it, which also closes
/// the connection.
#[derive(Debug, Clone)]
pub struct MemberOutbox {
    member: MemberId,
    tx: mpsc::Sender<SignalMessage>,
    evicted: CancellationToken,
}

impl MemberOutbox {
    pub fn new(member: MemberId, tx: mpsc::Sender<SignalMessage>) -> Self {
        Self {
            member,
            tx,
            evicted: CancellationToken::new(),
        }
    }

    /// Create an outbox together with the receiver the transport drains.
    pub fn channel(member: MemberId, capacity: usize) -> (Self, mpsc::Receiver<SignalMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(member, tx), rx)
    }

    pub fn member(&self) -> &MemberId {
        &self.member
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.is_evicted()
    }

    /// Mark the connection as dropped by its room. The transport stops
    /// writing and hangs up.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once [`MemberOutbox::evict`] has been called on any clone.
    pub async fn evicted(&self) {
        self.evicted.cancelled().await
    }

    /// Enqueue a message, waiting at most `timeout` for capacity.
    pub async fn deliver(
        &self,
        message: SignalMessage,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        if self.is_evicted() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.send_timeout(message, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
            Err(SendTimeoutError::Timeout(_)) => Err(DeliveryError::TimedOut),
        }
    }
}
