use anyhow::{Context, Result};
use parley_client::supervisor::{PeerAudio, PeerStatus, SupervisorContext};
use parley_client::testing::MockLinkFactory;
use parley_client::{LocalAudioTrack, LocalMedia};
use parley_core::utils::default_ice_servers;
use parley_core::{CandidateDescriptor, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const OFFER_SDP: &str = "v=0\r\no=remote-offer\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=remote-answer\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";

const WAIT: Duration = Duration::from_secs(2);

/// A supervisor context whose outbound frames, status reports and remote
/// audio are observable by the test.
pub struct SupervisorHarness {
    pub ctx: SupervisorContext,
    pub outbound: mpsc::UnboundedReceiver<SignalMessage>,
    pub status: mpsc::UnboundedReceiver<PeerStatus>,
    pub audio: mpsc::UnboundedReceiver<PeerAudio>,
}

impl SupervisorHarness {
    pub fn new(links: MockLinkFactory, negotiation_timeout: Option<Duration>) -> Self {
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let (status_tx, status) = mpsc::unbounded_channel();
        let (audio_tx, audio) = mpsc::unbounded_channel();

        let ctx = SupervisorContext {
            links: Arc::new(links),
            media: LocalMedia::new(vec![Arc::new(LocalAudioTrack::opus("audio", "test"))]),
            ice_servers: default_ice_servers(),
            outbound: outbound_tx,
            status: status_tx,
            remote_audio: audio_tx,
            negotiation_timeout,
            disconnect_grace: Duration::from_secs(5),
        };

        Self {
            ctx,
            outbound,
            status,
            audio,
        }
    }

    pub async fn next_frame(&mut self) -> Result<SignalMessage> {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .context("timed out waiting for an outbound frame")?
            .context("outbound channel closed")
    }

    pub async fn next_audio(&mut self) -> Result<PeerAudio> {
        tokio::time::timeout(WAIT, self.audio.recv())
            .await
            .context("timed out waiting for remote audio")?
            .context("audio channel closed")
    }

    /// Whether any status report so far carried an error, without waiting.
    pub fn saw_error(&mut self) -> bool {
        let mut failed = false;
        while let Ok(status) = self.status.try_recv() {
            failed |= status.error.is_some();
        }
        failed
    }

    /// Skip status reports until one carries an error.
    pub async fn next_error(&mut self) -> Result<PeerStatus> {
        loop {
            let status = tokio::time::timeout(WAIT, self.status.recv())
                .await
                .context("timed out waiting for a status")?
                .context("status channel closed")?;
            if status.error.is_some() {
                return Ok(status);
            }
        }
    }
}

pub fn remote_candidate(n: u32) -> CandidateDescriptor {
    CandidateDescriptor {
        candidate: format!("candidate:{n} 1 udp 2130706431 10.0.0.{n} 6000 typ host"),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
    }
}
