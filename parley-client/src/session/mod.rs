//! Client session: one room, one supervisor per remote member.

mod enter_room_impl;
mod handle_signal_impl;
mod leave_room_impl;

use crate::config::ClientConfig;
use crate::error::NegotiationError;
use crate::link::{PeerLinkFactory, RtcLinkFactory};
use crate::media::{LocalMedia, MediaCapture, OpusCapture, RemoteAudio};
use crate::supervisor::{
    ConnectionSupervisor, NegotiationState, PeerAudio, PeerStatus, Role, SupervisorContext,
    SupervisorHandle,
};
use crate::transport::{SignalingTransport, WsTransport};
use parley_core::{ErrorCode, MemberId, RoomId, SignalMessage};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Something the application may want to react to.
#[derive(Debug)]
pub enum SessionEvent {
    PeerJoined(MemberId),
    PeerLeft(MemberId),
    PeerState {
        member: MemberId,
        state: NegotiationState,
        error: Option<NegotiationError>,
    },
    /// A peer's audio is arriving. Payloads stop when its link closes.
    RemoteAudio {
        member: MemberId,
        audio: RemoteAudio,
    },
    /// The server refused one of our frames.
    SignalRejected {
        code: ErrorCode,
        target: Option<MemberId>,
        message: String,
    },
    /// The signaling connection dropped; the session has been torn down.
    Disconnected,
}

pub struct SessionController {
    config: ClientConfig,
    transport: Arc<dyn SignalingTransport>,
    capture: Arc<dyn MediaCapture>,
    links: Arc<dyn PeerLinkFactory>,
    muted: bool,
    session: Option<ActiveSession>,
}

/// State that exists only while in a room.
struct ActiveSession {
    room: RoomId,
    member: MemberId,
    media: LocalMedia,
    inbound: mpsc::UnboundedReceiver<SignalMessage>,
    status_rx: mpsc::UnboundedReceiver<PeerStatus>,
    audio_rx: mpsc::UnboundedReceiver<PeerAudio>,
    /// Frames that arrived while waiting for the join reply.
    backlog: VecDeque<SignalMessage>,
    present: BTreeSet<MemberId>,
    supervisors: BTreeMap<MemberId, SupervisorHandle>,
    ctx: SupervisorContext,
    next_supervisor: u64,
}

impl SessionController {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn SignalingTransport>,
        capture: Arc<dyn MediaCapture>,
        links: Arc<dyn PeerLinkFactory>,
    ) -> Self {
        Self {
            config,
            transport,
            capture,
            links,
            muted: false,
            session: None,
        }
    }

    /// Websocket signaling, Opus capture and `webrtc` peer links.
    pub fn websocket(url: impl Into<String>, config: ClientConfig) -> Self {
        Self::new(
            config,
            Arc::new(WsTransport::new(url)),
            Arc::new(OpusCapture::default()),
            Arc::new(RtcLinkFactory),
        )
    }

    pub fn member_id(&self) -> Option<&MemberId> {
        self.session.as_ref().map(|s| &s.member)
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.session.as_ref().map(|s| &s.room)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Stop or resume sending captured audio. No renegotiation is involved.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(session) = &self.session {
            session.media.set_enabled(!muted);
        }
        info!("Microphone {}", if muted { "muted" } else { "unmuted" });
    }

    /// Remote members with a supervisor, and how far negotiation got.
    pub fn peers(&self) -> Vec<(MemberId, NegotiationState)> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        session
            .supervisors
            .iter()
            .map(|(member, handle)| (member.clone(), handle.state()))
            .collect()
    }

    /// Display labels of the remote members with a supervisor, e.g.
    /// `("User-3f9a", Connected)`.
    pub fn participants(&self) -> Vec<(String, NegotiationState)> {
        self.peers()
            .into_iter()
            .map(|(member, state)| (member.label(), state))
            .collect()
    }

    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.session.as_ref().map(|s| &s.media)
    }
}

impl ActiveSession {
    fn spawn_supervisor(&mut self, remote: MemberId, role: Role) -> &SupervisorHandle {
        self.next_supervisor += 1;
        debug!("Starting {:?} supervisor for {}", role, remote);
        let handle =
            ConnectionSupervisor::spawn(self.next_supervisor, remote.clone(), role, self.ctx.clone());
        // A replaced handle cancels its supervisor when dropped.
        self.supervisors.insert(remote.clone(), handle);
        &self.supervisors[&remote]
    }

    /// Cancel everything without waiting. Used on drop.
    fn abort(&mut self) {
        for handle in self.supervisors.values() {
            handle.cancel();
        }
        self.supervisors.clear();
        self.media.release();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!("Session for room {} dropped", session.room);
            session.abort();
        }
    }
}
