//! In-memory doubles for the transport, peer link and capture seams.

use crate::error::{MediaError, TransportError};
use crate::link::{LinkEvent, PeerLink, PeerLinkFactory, SdpKind};
use crate::media::{LocalAudioTrack, LocalMedia, MediaCapture, RemoteAudio, RemoteAudioFeed};
use crate::transport::{SignalingTransport, TransportChannels};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use parley_core::{CandidateDescriptor, IceServerConfig, MemberId, SignalMessage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long [`RemoteEnd::recv`] waits for a frame.
pub const REMOTE_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport whose other end is driven by the test.
pub struct ChannelTransport {
    channels: Mutex<Option<TransportChannels>>,
}

/// The server side of a [`ChannelTransport`].
pub struct RemoteEnd {
    pub to_client: mpsc::UnboundedSender<SignalMessage>,
    pub from_client: mpsc::UnboundedReceiver<SignalMessage>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, RemoteEnd) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();

        let transport = Self {
            channels: Mutex::new(Some(TransportChannels { outbound, inbound })),
        };
        (
            transport,
            RemoteEnd {
                to_client,
                from_client,
            },
        )
    }
}

#[async_trait]
impl SignalingTransport for ChannelTransport {
    async fn connect(&self) -> Result<TransportChannels, TransportError> {
        let taken = self
            .channels
            .lock()
            .map_err(|_| TransportError::Closed)?
            .take();
        taken.ok_or_else(|| TransportError::Connect {
            url: "memory".to_owned(),
            reason: "channel already used".to_owned(),
        })
    }
}

impl RemoteEnd {
    pub fn send(&self, msg: SignalMessage) {
        let _ = self.to_client.send(msg);
    }

    pub async fn recv(&mut self) -> Result<SignalMessage> {
        tokio::time::timeout(REMOTE_RECV_TIMEOUT, self.from_client.recv())
            .await
            .context("timed out waiting for a client frame")?
            .context("client closed the transport")
    }

    /// Wait for the next frame of the given kind, skipping others.
    pub async fn recv_kind(&mut self, kind: &str) -> Result<SignalMessage> {
        loop {
            let msg = self.recv().await?;
            if msg.kind() == kind {
                return Ok(msg);
            }
        }
    }

    /// Whether the client has dropped its side, without waiting.
    pub fn is_client_gone(&mut self) -> bool {
        matches!(
            self.from_client.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

/// Every call made on a [`MockPeerLink`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind, String),
    SetRemote(SdpKind, String),
    AddCandidate(CandidateDescriptor),
    Close,
}

/// Peer link that records calls and fakes connectivity.
///
/// SDP must start with `v=0` and candidates with `candidate:`; anything
/// else is rejected as malformed. With auto-connect on, `Connected` is
/// emitted once both descriptions are set.
pub struct MockPeerLink {
    remote: MemberId,
    events: mpsc::UnboundedSender<LinkEvent>,
    calls: Mutex<Vec<LinkCall>>,
    auto_connect: bool,
    local_candidates: usize,
    stall_offers: bool,
    local_set: AtomicBool,
    remote_set: AtomicBool,
}

impl MockPeerLink {
    pub fn new(remote: MemberId, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            remote,
            events,
            calls: Mutex::new(Vec::new()),
            auto_connect: true,
            local_candidates: 1,
            stall_offers: false,
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
        }
    }

    pub fn remote(&self) -> &MemberId {
        &self.remote
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn applied_candidates(&self) -> Vec<CandidateDescriptor> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LinkCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.calls().contains(&LinkCall::Close)
    }

    /// Raise a link event as if the connection produced it.
    pub fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    /// Start an incoming Opus track; the test writes its payloads.
    pub fn play_audio(&self, track_id: &str) -> RemoteAudioFeed {
        let (feed, audio) = RemoteAudio::channel(track_id, "audio/opus");
        self.emit(LinkEvent::RemoteAudio(audio));
        feed
    }

    fn record(&self, call: LinkCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn maybe_connect(&self) {
        if self.auto_connect
            && self.local_set.load(Ordering::SeqCst)
            && self.remote_set.load(Ordering::SeqCst)
        {
            self.emit(LinkEvent::Connected);
        }
    }
}

fn check_sdp(sdp: &str) -> Result<()> {
    if !sdp.starts_with("v=0") {
        bail!("malformed session description");
    }
    Ok(())
}

#[async_trait]
impl PeerLink for MockPeerLink {
    async fn create_offer(&self) -> Result<String> {
        self.record(LinkCall::CreateOffer);
        if self.stall_offers {
            std::future::pending::<()>().await;
        }
        Ok(format!("v=0\r\no=mock-offer {}\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n", self.remote))
    }

    async fn create_answer(&self) -> Result<String> {
        self.record(LinkCall::CreateAnswer);
        Ok(format!("v=0\r\no=mock-answer {}\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n", self.remote))
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        check_sdp(&sdp)?;
        self.record(LinkCall::SetLocal(kind, sdp));
        self.local_set.store(true, Ordering::SeqCst);

        for i in 0..self.local_candidates {
            self.emit(LinkEvent::LocalCandidate(CandidateDescriptor {
                candidate: format!("candidate:{i} 1 udp 2130706431 192.168.1.{i} 5{i:04} typ host"),
                sdp_mid: Some("0".to_owned()),
                sdp_m_line_index: Some(0),
            }));
        }
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        check_sdp(&sdp)?;
        self.record(LinkCall::SetRemote(kind, sdp));
        self.remote_set.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        if !candidate.candidate.starts_with("candidate:") {
            bail!("malformed candidate: {}", candidate.candidate);
        }
        self.record(LinkCall::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(LinkCall::Close);
        Ok(())
    }
}

/// Hands out [`MockPeerLink`]s and keeps them for inspection.
#[derive(Clone)]
pub struct MockLinkFactory {
    links: Arc<Mutex<Vec<Arc<MockPeerLink>>>>,
    auto_connect: bool,
    local_candidates: usize,
    stall_offers: bool,
    refuse: bool,
}

impl MockLinkFactory {
    pub fn new() -> Self {
        Self {
            links: Arc::new(Mutex::new(Vec::new())),
            auto_connect: true,
            local_candidates: 1,
            stall_offers: false,
            refuse: false,
        }
    }

    /// Links never report `Connected` on their own.
    pub fn without_auto_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }

    pub fn with_local_candidates(mut self, count: usize) -> Self {
        self.local_candidates = count;
        self
    }

    /// `create_offer` never completes.
    pub fn stalling_offers(mut self) -> Self {
        self.stall_offers = true;
        self
    }

    /// Every `create_link` fails.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn created(&self) -> usize {
        self.links.lock().map(|l| l.len()).unwrap_or_default()
    }

    /// The most recent link created for `remote`.
    pub fn link_for(&self, remote: &MemberId) -> Option<Arc<MockPeerLink>> {
        let links = self.links.lock().ok()?;
        links.iter().rev().find(|l| &l.remote == remote).cloned()
    }
}

impl Default for MockLinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerLinkFactory for MockLinkFactory {
    async fn create_link(
        &self,
        remote: &MemberId,
        _ice_servers: &[IceServerConfig],
        _media: &LocalMedia,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>> {
        if self.refuse {
            bail!("peer connection unavailable");
        }

        let mut link = MockPeerLink::new(remote.clone(), events);
        link.auto_connect = self.auto_connect;
        link.local_candidates = self.local_candidates;
        link.stall_offers = self.stall_offers;
        let link = Arc::new(link);

        if let Ok(mut links) = self.links.lock() {
            links.push(link.clone());
        }
        Ok(link)
    }
}

/// Capture that either hands out a silent Opus track or is denied.
#[derive(Clone)]
pub struct MockCapture {
    denied: bool,
    acquired: Arc<Mutex<Vec<LocalMedia>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockCapture {
    pub fn available() -> Self {
        Self {
            denied: false,
            acquired: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::available()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_media(&self) -> Option<LocalMedia> {
        self.acquired.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl MediaCapture for MockCapture {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.denied {
            return Err(MediaError::PermissionDenied);
        }

        let media = LocalMedia::new(vec![Arc::new(LocalAudioTrack::opus("audio", "mock"))]);
        if let Ok(mut acquired) = self.acquired.lock() {
            acquired.push(media.clone());
        }
        Ok(media)
    }
}
