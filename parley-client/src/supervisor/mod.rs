mod connection_supervisor;
mod negotiation;

pub use connection_supervisor::*;
pub use negotiation::*;

use std::fmt;

/// Negotiation progress of one peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    LocalDescriptionSet,
    RemoteDescriptionSet,
    Connected,
    Closed,
    Failed,
}

impl NegotiationState {
    /// `Closed` and `Failed` are final: the link is gone.
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferCreated => "offer created",
            NegotiationState::LocalDescriptionSet => "local description set",
            NegotiationState::RemoteDescriptionSet => "remote description set",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
            NegotiationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which side of the offer/answer exchange this client plays for a peer.
///
/// The member already in the room offers; the newcomer answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}
