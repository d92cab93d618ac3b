//! Seam over a single peer connection.
//!
//! The negotiation state machine only talks to [`PeerLink`]; the `webrtc`
//! implementation lives in [`RtcPeerLink`] and tests swap in an in-memory
//! link.

mod rtc_link;

pub use rtc_link::*;

use crate::media::{LocalMedia, RemoteAudio};
use anyhow::Result;
use async_trait::async_trait;
use parley_core::{CandidateDescriptor, IceServerConfig, MemberId};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Asynchronous notifications raised by a link.
#[derive(Debug)]
pub enum LinkEvent {
    LocalCandidate(CandidateDescriptor),
    /// The remote member started sending audio.
    RemoteAudio(RemoteAudio),
    Connected,
    /// Connectivity was lost and may come back on its own.
    Disconnected,
    Failed,
}

#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates one link per remote member, with the local tracks attached.
#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    async fn create_link(
        &self,
        remote: &MemberId,
        ice_servers: &[IceServerConfig],
        media: &LocalMedia,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>>;
}
