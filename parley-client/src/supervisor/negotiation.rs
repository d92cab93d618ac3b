use crate::error::NegotiationError;
use crate::link::{PeerLink, SdpKind};
use crate::supervisor::{NegotiationState, Role};
use parley_core::{CandidateDescriptor, MemberId, SignalMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Offer/answer state machine for the link to one remote member.
///
/// Remote candidates that arrive before the remote description are queued
/// and applied, in arrival order, right after it is set. Any error moves the
/// machine to [`NegotiationState::Failed`] and releases the link.
pub struct PeerNegotiation {
    remote: MemberId,
    role: Role,
    state: NegotiationState,
    link: Option<Arc<dyn PeerLink>>,
    pending: VecDeque<CandidateDescriptor>,
    remote_applied: bool,
}

impl PeerNegotiation {
    pub fn new(remote: MemberId, role: Role, link: Arc<dyn PeerLink>) -> Self {
        Self {
            remote,
            role,
            state: NegotiationState::Idle,
            link: Some(link),
            pending: VecDeque::new(),
            remote_applied: false,
        }
    }

    pub fn remote(&self) -> &MemberId {
        &self.remote
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Offerer only: create and apply the local offer.
    pub async fn start_offer(&mut self) -> Result<Option<SignalMessage>, NegotiationError> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        if self.role != Role::Offerer || self.state != NegotiationState::Idle {
            return Err(self.unexpected("local offer").await);
        }

        let link = self.link()?;
        let sdp = match link.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.link_error("create offer", e).await),
        };
        self.state = NegotiationState::OfferCreated;

        if let Err(e) = link.set_local_description(SdpKind::Offer, sdp.clone()).await {
            return Err(self.link_error("local offer", e).await);
        }
        self.state = NegotiationState::LocalDescriptionSet;

        Ok(Some(SignalMessage::Offer {
            source: None,
            target: self.remote.clone(),
            sdp,
        }))
    }

    /// Answerer only: apply the remote offer and produce the answer.
    pub async fn accept_offer(
        &mut self,
        sdp: String,
    ) -> Result<Option<SignalMessage>, NegotiationError> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        if self.role != Role::Answerer || self.state != NegotiationState::Idle {
            return Err(self.unexpected("offer").await);
        }

        let link = self.link()?;
        if let Err(e) = link.set_remote_description(SdpKind::Offer, sdp).await {
            return Err(self.link_error("remote offer", e).await);
        }
        self.state = NegotiationState::RemoteDescriptionSet;
        self.remote_applied = true;
        self.drain_pending(&link).await?;

        let answer = match link.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return Err(self.link_error("create answer", e).await),
        };
        if let Err(e) = link
            .set_local_description(SdpKind::Answer, answer.clone())
            .await
        {
            return Err(self.link_error("local answer", e).await);
        }
        self.state = NegotiationState::LocalDescriptionSet;

        Ok(Some(SignalMessage::Answer {
            source: None,
            target: self.remote.clone(),
            sdp: answer,
        }))
    }

    /// Offerer only: apply the remote answer to our offer.
    pub async fn accept_answer(&mut self, sdp: String) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if self.role != Role::Offerer || self.state != NegotiationState::LocalDescriptionSet {
            return Err(self.unexpected("answer").await);
        }

        let link = self.link()?;
        if let Err(e) = link.set_remote_description(SdpKind::Answer, sdp).await {
            return Err(self.link_error("remote answer", e).await);
        }
        self.state = NegotiationState::RemoteDescriptionSet;
        self.remote_applied = true;
        self.drain_pending(&link).await
    }

    pub async fn add_remote_candidate(
        &mut self,
        candidate: CandidateDescriptor,
    ) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            debug!("Discarding candidate from {} while {}", self.remote, self.state);
            return Ok(());
        }
        if !self.remote_applied {
            self.pending.push_back(candidate);
            return Ok(());
        }

        let link = self.link()?;
        if let Err(e) = link.add_ice_candidate(candidate).await {
            return Err(self.link_error("remote candidate", e).await);
        }
        Ok(())
    }

    /// Candidate gathered by our link, to be relayed to the remote member.
    pub fn local_candidate(&self, candidate: CandidateDescriptor) -> Option<SignalMessage> {
        if self.state.is_terminal() {
            return None;
        }

        Some(SignalMessage::IceCandidate {
            source: None,
            target: self.remote.clone(),
            candidate,
        })
    }

    /// The link reports media connectivity. Returns whether the state moved.
    pub fn link_connected(&mut self) -> bool {
        let ready = match self.state {
            NegotiationState::RemoteDescriptionSet => true,
            NegotiationState::LocalDescriptionSet => self.remote_applied,
            _ => false,
        };
        if ready {
            self.state = NegotiationState::Connected;
        }
        ready
    }

    /// The link reports it has failed for good.
    pub async fn link_failed(&mut self) -> Option<NegotiationError> {
        if self.state.is_terminal() {
            return None;
        }
        Some(self.fail(NegotiationError::LinkFailed).await)
    }

    /// Abort with `error` unless already finished.
    pub async fn fail(&mut self, error: NegotiationError) -> NegotiationError {
        warn!("Negotiation with {} failed while {}: {}", self.remote, self.state, error);
        self.state = NegotiationState::Failed;
        self.release().await;
        error
    }

    /// Tear the link down. Closing a finished negotiation does nothing.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        debug!("Closing link to {} while {}", self.remote, self.state);
        self.state = NegotiationState::Closed;
        self.release().await;
    }

    async fn drain_pending(&mut self, link: &Arc<dyn PeerLink>) -> Result<(), NegotiationError> {
        while let Some(candidate) = self.pending.pop_front() {
            if let Err(e) = link.add_ice_candidate(candidate).await {
                return Err(self.link_error("buffered candidate", e).await);
            }
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.pending.clear();
        let Some(link) = self.link.take() else {
            return;
        };
        if let Err(e) = link.close().await {
            warn!("Failed to close link to {}: {}", self.remote, e);
        }
    }

    fn link(&self) -> Result<Arc<dyn PeerLink>, NegotiationError> {
        self.link.clone().ok_or(NegotiationError::UnexpectedMessage {
            message: "link access",
            state: self.state,
        })
    }

    async fn unexpected(&mut self, message: &'static str) -> NegotiationError {
        let state = self.state;
        self.fail(NegotiationError::UnexpectedMessage { message, state })
            .await
    }

    async fn link_error(&mut self, step: &'static str, source: anyhow::Error) -> NegotiationError {
        self.fail(NegotiationError::Link { step, source }).await
    }
}
