//! Signaling error types.
//!
//! Every variant maps to a wire [`ErrorCode`] so the failure can be reported
//! back to the member whose request caused it.

use crate::transport::DeliveryError;
use parley_core::{ErrorCode, MemberId, RoomId, SignalMessage};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// The connection is already registered under another room.
    #[error("member {member} already joined room {room}")]
    AlreadyJoined { member: MemberId, room: RoomId },

    /// The sender is not joined to any room.
    #[error("member {0} is not in any room")]
    UnknownSource(MemberId),

    /// The addressed member is not in the sender's room.
    #[error("target {target} is not in room {room}")]
    TargetNotInRoom { target: MemberId, room: RoomId },

    /// The target's transport is closed or saturated.
    #[error("delivery to {target} failed: {reason}")]
    DeliveryFailed {
        target: MemberId,
        reason: DeliveryError,
    },

    /// Only offers, answers and candidates are relayed between members.
    #[error("{0} messages cannot be routed")]
    Unroutable(&'static str),

    /// The room actor stopped before answering.
    #[error("room {0} is unavailable")]
    RoomUnavailable(RoomId),
}

impl SignalingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SignalingError::AlreadyJoined { .. } => ErrorCode::AlreadyJoined,
            SignalingError::UnknownSource(_) => ErrorCode::UnknownSource,
            SignalingError::TargetNotInRoom { .. } => ErrorCode::TargetNotInRoom,
            SignalingError::DeliveryFailed { .. } => ErrorCode::DeliveryFailed,
            SignalingError::Unroutable(_) => ErrorCode::Unroutable,
            SignalingError::RoomUnavailable(_) => ErrorCode::Internal,
        }
    }

    /// The member a failed relay was addressed to, if any.
    pub fn target(&self) -> Option<&MemberId> {
        match self {
            SignalingError::TargetNotInRoom { target, .. }
            | SignalingError::DeliveryFailed { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Frame reported to the member whose request failed.
    pub fn to_signal(&self) -> SignalMessage {
        let message = match self {
            SignalingError::RoomUnavailable(_) => "An internal error occurred".to_owned(),
            other => other.to_string(),
        };

        SignalMessage::Error {
            code: self.code(),
            target: self.target().cloned(),
            message,
        }
    }
}
