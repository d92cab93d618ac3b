use crate::error::SessionError;
use crate::session::{ActiveSession, SessionController, SessionEvent};
use crate::supervisor::{PeerAudio, PeerStatus, Role};
use parley_core::{MemberId, SignalMessage};
use tracing::{debug, info, warn};

enum Incoming {
    Signal(SignalMessage),
    Status(PeerStatus),
    Audio(PeerAudio),
    Closed,
}

impl SessionController {
    /// Process inbound traffic until something observable happens.
    ///
    /// Signals are handled one at a time in arrival order; supervisor state
    /// changes are interleaved as they come in.
    pub async fn next_event(&mut self) -> Result<SessionEvent, SessionError> {
        loop {
            let session = self.session.as_mut().ok_or(SessionError::NotInRoom)?;

            let incoming = match session.backlog.pop_front() {
                Some(msg) => Incoming::Signal(msg),
                None => tokio::select! {
                    msg = session.inbound.recv() => match msg {
                        Some(msg) => Incoming::Signal(msg),
                        None => Incoming::Closed,
                    },
                    Some(status) = session.status_rx.recv() => Incoming::Status(status),
                    Some(audio) = session.audio_rx.recv() => Incoming::Audio(audio),
                },
            };

            let event = match incoming {
                Incoming::Signal(msg) => session.handle_signal(msg).await,
                Incoming::Status(status) => session.handle_status(status),
                Incoming::Audio(audio) => session.handle_audio(audio),
                Incoming::Closed => {
                    warn!("Signaling connection to room {} lost", session.room);
                    self.teardown().await;
                    Some(SessionEvent::Disconnected)
                }
            };

            if let Some(event) = event {
                return Ok(event);
            }
        }
    }
}

impl ActiveSession {
    async fn handle_signal(&mut self, msg: SignalMessage) -> Option<SessionEvent> {
        match msg {
            SignalMessage::PeerJoined { member } => {
                if member == self.member {
                    return None;
                }
                info!("{} joined room {}", member, self.room);
                self.present.insert(member.clone());
                if let Some(mut stale) = self.supervisors.remove(&member) {
                    stale.close().await;
                }
                self.spawn_supervisor(member.clone(), Role::Offerer);
                Some(SessionEvent::PeerJoined(member))
            }

            SignalMessage::PeerLeft { member } => {
                info!("{} left room {}", member, self.room);
                self.present.remove(&member);
                if let Some(mut handle) = self.supervisors.remove(&member) {
                    handle.close().await;
                }
                Some(SessionEvent::PeerLeft(member))
            }

            SignalMessage::Offer {
                source: Some(source),
                sdp,
                ..
            } => {
                if let Some(handle) = self.supervisors.get(&source) {
                    handle.remote_offer(sdp);
                } else if self.present.contains(&source) {
                    self.spawn_supervisor(source, Role::Answerer).remote_offer(sdp);
                } else {
                    self.drop_signal("offer", &source);
                }
                None
            }

            SignalMessage::Answer {
                source: Some(source),
                sdp,
                ..
            } => {
                match self.supervisors.get(&source) {
                    Some(handle) => handle.remote_answer(sdp),
                    None => self.drop_signal("answer", &source),
                }
                None
            }

            SignalMessage::IceCandidate {
                source: Some(source),
                candidate,
                ..
            } => {
                match self.supervisors.get(&source) {
                    Some(handle) => handle.remote_candidate(candidate),
                    None => self.drop_signal("candidate", &source),
                }
                None
            }

            SignalMessage::Error {
                code,
                target,
                message,
            } => {
                warn!("Server rejected a signal ({:?}): {}", code, message);
                Some(SessionEvent::SignalRejected {
                    code,
                    target,
                    message,
                })
            }

            other => {
                warn!("Ignoring unexpected {} frame", other.kind());
                None
            }
        }
    }

    fn handle_status(&mut self, status: PeerStatus) -> Option<SessionEvent> {
        let current = self
            .supervisors
            .get(&status.member)
            .is_some_and(|h| h.id() == status.supervisor);
        if !current {
            debug!("Dropping stale status for {}", status.member);
            return None;
        }

        Some(SessionEvent::PeerState {
            member: status.member,
            state: status.state,
            error: status.error,
        })
    }

    fn handle_audio(&mut self, audio: PeerAudio) -> Option<SessionEvent> {
        let current = self
            .supervisors
            .get(&audio.member)
            .is_some_and(|h| h.id() == audio.supervisor);
        if !current {
            debug!("Dropping audio from replaced link to {}", audio.member);
            return None;
        }

        info!("Receiving audio from {}", audio.member);
        Some(SessionEvent::RemoteAudio {
            member: audio.member,
            audio: audio.audio,
        })
    }

    fn drop_signal(&self, kind: &str, source: &MemberId) {
        warn!("Dropping {} from unknown member {}", kind, source);
    }
}
