use crate::model::member::MemberId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// ICE candidate as produced by `RTCIceCandidate.toJSON()` in browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescriptor {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Reason a request was rejected by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AlreadyJoined,
    UnknownSource,
    TargetNotInRoom,
    DeliveryFailed,
    Unroutable,
    Internal,
}

/// Every frame exchanged over the signaling transport.
///
/// `Offer`, `Answer` and `IceCandidate` are relayed between members. Clients
/// leave `source` empty; the server stamps it with the sending connection's
/// id before forwarding and never trusts a client-supplied value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalMessage {
    Join {
        room: RoomId,
    },
    Joined {
        room: RoomId,
        member: MemberId,
        peers: Vec<MemberId>,
        #[serde(default)]
        ice_servers: Vec<IceServerConfig>,
    },
    Leave,
    PeerJoined {
        member: MemberId,
    },
    PeerLeft {
        member: MemberId,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<MemberId>,
        target: MemberId,
        sdp: String,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<MemberId>,
        target: MemberId,
        sdp: String,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<MemberId>,
        target: MemberId,
        candidate: CandidateDescriptor,
    },
    Error {
        code: ErrorCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<MemberId>,
        message: String,
    },
}

impl SignalMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::Leave => "leave",
            SignalMessage::PeerJoined { .. } => "peer_joined",
            SignalMessage::PeerLeft { .. } => "peer_left",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice_candidate",
            SignalMessage::Error { .. } => "error",
        }
    }

    /// True for the member-to-member variants the router forwards.
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::IceCandidate { .. }
        )
    }

    pub fn target(&self) -> Option<&MemberId> {
        match self {
            SignalMessage::Offer { target, .. }
            | SignalMessage::Answer { target, .. }
            | SignalMessage::IceCandidate { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&MemberId> {
        match self {
            SignalMessage::Offer { source, .. }
            | SignalMessage::Answer { source, .. }
            | SignalMessage::IceCandidate { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Overwrite the source of a relayed message. Other variants pass through.
    pub fn with_source(mut self, member: MemberId) -> Self {
        match &mut self {
            SignalMessage::Offer { source, .. }
            | SignalMessage::Answer { source, .. }
            | SignalMessage::IceCandidate { source, .. } => *source = Some(member),
            _ => {}
        }
        self
    }
}
