use crate::supervisor::NegotiationState;
use parley_core::{ErrorCode, RoomId};
use std::time::Duration;
use thiserror::Error;

/// Why negotiation with one peer stopped. Terminal for that peer only.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("unexpected {message} while {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: NegotiationState,
    },

    #[error("peer link rejected {step}: {source}")]
    Link {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("peer link reported failure")]
    LinkFailed,

    #[error("not connected within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("capture permission denied")]
    PermissionDenied,
    #[error("no capture device: {0}")]
    NoDevice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("signaling transport closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("local media unavailable: {0}")]
    MediaUnavailable(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("join rejected ({code:?}): {message}")]
    JoinRejected { code: ErrorCode, message: String },

    #[error("no join reply within {0:?}")]
    JoinTimeout(Duration),

    #[error("not in a room")]
    NotInRoom,

    #[error("already in room {0}")]
    AlreadyInRoom(RoomId),
}
