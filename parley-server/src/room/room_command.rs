use crate::error::SignalingError;
use crate::transport::MemberOutbox;
use parley_core::{MemberId, SignalMessage};
use tokio::sync::oneshot;

/// Commands processed one at a time by a room actor.
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a member. Replies with the members that were already present,
    /// or `DeliveryFailed` when the joiner could not be sent `Joined`.
    Join {
        member: MemberId,
        outbox: MemberOutbox,
        respond_to: oneshot::Sender<Result<Vec<MemberId>, SignalingError>>,
    },

    /// Remove a member. Replies `true` if it was present.
    Leave {
        member: MemberId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Relay an offer, answer or candidate to a member of this room.
    Route {
        source: MemberId,
        message: SignalMessage,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Snapshot of the current member set.
    Members {
        respond_to: oneshot::Sender<Vec<MemberId>>,
    },
}
