use crate::error::{SessionError, TransportError};
use crate::session::{ActiveSession, SessionController};
use crate::supervisor::{Role, SupervisorContext};
use crate::transport::TransportChannels;
use parley_core::{IceServerConfig, MemberId, RoomId, SignalMessage};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct JoinReply {
    member: MemberId,
    peers: Vec<MemberId>,
    ice_servers: Vec<IceServerConfig>,
    backlog: VecDeque<SignalMessage>,
}

impl SessionController {
    /// Join `room` and start negotiating with everyone already in it.
    ///
    /// Returns the members that were present. Nothing is left running if
    /// this fails.
    pub async fn enter_room(&mut self, room: RoomId) -> Result<Vec<MemberId>, SessionError> {
        if let Some(session) = &self.session {
            return Err(SessionError::AlreadyInRoom(session.room.clone()));
        }

        let media = self.capture.acquire().await?;
        media.set_enabled(!self.muted);

        let TransportChannels {
            outbound,
            mut inbound,
        } = match self.transport.connect().await {
            Ok(channels) => channels,
            Err(e) => {
                media.release();
                return Err(e.into());
            }
        };

        let reply = match Self::join(&outbound, &mut inbound, &room, self.config.join_timeout).await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to join room {}: {}", room, e);
                media.release();
                return Err(e);
            }
        };

        let ice_servers = self.config.resolve_ice_servers(&reply.ice_servers);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let mut session = ActiveSession {
            room: room.clone(),
            member: reply.member,
            media: media.clone(),
            inbound,
            status_rx,
            audio_rx,
            backlog: reply.backlog,
            present: reply.peers.iter().cloned().collect::<BTreeSet<_>>(),
            supervisors: BTreeMap::new(),
            ctx: SupervisorContext {
                links: self.links.clone(),
                media,
                ice_servers,
                outbound,
                status: status_tx,
                remote_audio: audio_tx,
                negotiation_timeout: self.config.negotiation_timeout,
                disconnect_grace: self.config.disconnect_grace,
            },
            next_supervisor: 0,
        };

        for peer in &reply.peers {
            session.spawn_supervisor(peer.clone(), Role::Answerer);
        }

        info!(
            "Joined room {} as {} with {} peer(s)",
            room,
            session.member,
            reply.peers.len()
        );
        self.session = Some(session);
        Ok(reply.peers)
    }

    async fn join(
        outbound: &mpsc::UnboundedSender<SignalMessage>,
        inbound: &mut mpsc::UnboundedReceiver<SignalMessage>,
        room: &RoomId,
        timeout: std::time::Duration,
    ) -> Result<JoinReply, SessionError> {
        outbound
            .send(SignalMessage::Join { room: room.clone() })
            .map_err(|_| TransportError::Closed)?;

        let wait = async {
            let mut backlog = VecDeque::new();
            loop {
                match inbound.recv().await {
                    Some(SignalMessage::Joined {
                        room: joined,
                        member,
                        peers,
                        ice_servers,
                    }) if &joined == room => {
                        return Ok(JoinReply {
                            member,
                            peers,
                            ice_servers,
                            backlog,
                        });
                    }
                    Some(SignalMessage::Error { code, message, .. }) => {
                        return Err(SessionError::JoinRejected { code, message });
                    }
                    Some(other) => {
                        debug!("Holding {} until the join completes", other.kind());
                        backlog.push_back(other);
                    }
                    None => return Err(SessionError::from(TransportError::Closed)),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::JoinTimeout(timeout))?
    }
}
