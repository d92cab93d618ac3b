use crate::link::{LinkEvent, PeerLink, PeerLinkFactory, SdpKind};
use crate::media::{LocalMedia, RemoteAudio};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::{CandidateDescriptor, IceServerConfig, MemberId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

const RTCP_BUFFER_SIZE: usize = 1500;

/// [`PeerLink`] backed by a `webrtc` peer connection.
pub struct RtcPeerLink {
    remote: MemberId,
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcPeerLink {
    pub async fn new(
        remote: MemberId,
        ice_servers: &[IceServerConfig],
        media: &LocalMedia,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        for track in media.tracks() {
            let sender = peer_connection
                .add_track(track.rtc_track() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("failed to add track {}", track.id()))?;

            // RTCP has to be read for the interceptors to work.
            tokio::spawn(async move {
                let mut buf = vec![0u8; RTCP_BUFFER_SIZE];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }

        let state_tx = events.clone();
        let state_remote = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                info!("Peer connection state for {}: {}", state_remote, s);
                let event = match s {
                    RTCPeerConnectionState::Connected => Some(LinkEvent::Connected),
                    RTCPeerConnectionState::Disconnected => Some(LinkEvent::Disconnected),
                    RTCPeerConnectionState::Failed => Some(LinkEvent::Failed),
                    _ => None,
                };
                if let Some(event) = event {
                    let _ = state_tx.send(event);
                }
                Box::pin(async {})
            },
        ));

        let track_tx = events.clone();
        let track_remote = remote.clone();
        peer_connection.on_track(Box::new(
            move |track, _receiver, _transceiver| {
                let events = track_tx.clone();
                let remote = track_remote.clone();
                Box::pin(async move {
                    if track.kind() != RTPCodecType::Audio {
                        debug!("Ignoring {:?} track from {}", track.kind(), remote);
                        return;
                    }

                    let (feed, audio) =
                        RemoteAudio::channel(track.id(), track.codec().capability.mime_type);
                    info!("Receiving {} audio from {}", audio.mime_type(), remote);
                    if events.send(LinkEvent::RemoteAudio(audio)).is_err() {
                        return;
                    }

                    tokio::spawn(async move {
                        while let Ok((packet, _)) = track.read_rtp().await {
                            if !feed.push(packet.payload) {
                                break;
                            }
                        }
                        debug!("Audio track from {} ended", remote);
                    });
                })
            },
        ));

        let ice_tx = events;
        let ice_remote = remote.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let Some(candidate) = c else {
                debug!("ICE gathering complete for {}", ice_remote);
                return Box::pin(async {});
            };
            match candidate.to_json() {
                Ok(init) => {
                    let _ = ice_tx.send(LinkEvent::LocalCandidate(CandidateDescriptor {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    }));
                }
                Err(e) => warn!("Failed to encode local candidate for {}: {}", ice_remote, e),
            }
            Box::pin(async {})
        }));

        Ok(Self {
            remote,
            peer_connection,
        })
    }

    pub fn remote(&self) -> &MemberId {
        &self.remote
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

#[async_trait]
impl PeerLink for RtcPeerLink {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = session_description(kind, sdp)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = session_description(kind, sdp).context("Failed to parse remote SDP")?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Builds an [`RtcPeerLink`] per remote member.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcLinkFactory;

#[async_trait]
impl PeerLinkFactory for RtcLinkFactory {
    async fn create_link(
        &self,
        remote: &MemberId,
        ice_servers: &[IceServerConfig],
        media: &LocalMedia,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>> {
        let link = RtcPeerLink::new(remote.clone(), ice_servers, media, events).await?;
        Ok(Arc::new(link))
    }
}

fn session_description(kind: SdpKind, sdp: String) -> Result<RTCSessionDescription> {
    let desc = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
    };
    Ok(desc)
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
    }
}
