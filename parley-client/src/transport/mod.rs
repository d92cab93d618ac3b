mod ws_transport;

pub use ws_transport::*;

use crate::error::TransportError;
use async_trait::async_trait;
use parley_core::SignalMessage;
use tokio::sync::mpsc;

/// Both directions of an open signaling connection.
///
/// Dropping `outbound` closes the connection; `inbound` yields `None` once
/// the server side is gone.
#[derive(Debug)]
pub struct TransportChannels {
    pub outbound: mpsc::UnboundedSender<SignalMessage>,
    pub inbound: mpsc::UnboundedReceiver<SignalMessage>,
}

#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn connect(&self) -> Result<TransportChannels, TransportError>;
}
