use crate::error::NegotiationError;
use crate::link::{LinkEvent, PeerLinkFactory};
use crate::media::{LocalMedia, RemoteAudio};
use crate::supervisor::{NegotiationState, PeerNegotiation, Role};
use parley_core::{CandidateDescriptor, IceServerConfig, MemberId, SignalMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a supervisor needs from its session.
#[derive(Clone)]
pub struct SupervisorContext {
    pub links: Arc<dyn PeerLinkFactory>,
    pub media: LocalMedia,
    pub ice_servers: Vec<IceServerConfig>,
    /// Frames to the signaling server.
    pub outbound: mpsc::UnboundedSender<SignalMessage>,
    /// State changes, reported back to the session.
    pub status: mpsc::UnboundedSender<PeerStatus>,
    /// Incoming audio, reported back to the session.
    pub remote_audio: mpsc::UnboundedSender<PeerAudio>,
    pub negotiation_timeout: Option<Duration>,
    /// How long a disconnected link may take to recover before it fails.
    pub disconnect_grace: Duration,
}

/// A supervisor's state changed.
#[derive(Debug)]
pub struct PeerStatus {
    pub supervisor: u64,
    pub member: MemberId,
    pub state: NegotiationState,
    pub error: Option<NegotiationError>,
}

/// A supervised peer started sending audio.
#[derive(Debug)]
pub struct PeerAudio {
    pub supervisor: u64,
    pub member: MemberId,
    pub audio: RemoteAudio,
}

#[derive(Debug)]
enum SupervisorCommand {
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(CandidateDescriptor),
}

enum Interrupted {
    Cancelled,
    DeadlineElapsed,
}

/// Drives the link to one remote member on its own task.
pub struct ConnectionSupervisor {
    id: u64,
    negotiation: PeerNegotiation,
    ctx: SupervisorContext,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    /// Set while the link is disconnected and may still recover.
    recover_by: Option<Instant>,
    state_tx: watch::Sender<NegotiationState>,
}

impl ConnectionSupervisor {
    /// Start supervising `remote`. An offerer sends its offer right away; an
    /// answerer waits for the remote offer.
    pub fn spawn(id: u64, remote: MemberId, role: Role, ctx: SupervisorContext) -> SupervisorHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(NegotiationState::Idle);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::run(
            id,
            remote.clone(),
            role,
            ctx,
            command_rx,
            state_tx,
            cancel.clone(),
        ));

        SupervisorHandle {
            id,
            remote,
            role,
            commands: command_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(
        id: u64,
        remote: MemberId,
        role: Role,
        ctx: SupervisorContext,
        mut commands: mpsc::UnboundedReceiver<SupervisorCommand>,
        state_tx: watch::Sender<NegotiationState>,
        cancel: CancellationToken,
    ) {
        let deadline = ctx.negotiation_timeout.map(|t| Instant::now() + t);
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();

        let created = guard(
            &cancel,
            deadline,
            ctx.links
                .create_link(&remote, &ctx.ice_servers, &ctx.media, link_tx),
        )
        .await;
        let link = match created {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                let error = NegotiationError::Link {
                    step: "create link",
                    source: e,
                };
                warn!("Could not create link to {}: {}", remote, error);
                report(id, &remote, &ctx, &state_tx, NegotiationState::Failed, Some(error));
                return;
            }
            Err(Interrupted::Cancelled) => {
                report(id, &remote, &ctx, &state_tx, NegotiationState::Closed, None);
                return;
            }
            Err(Interrupted::DeadlineElapsed) => {
                let error = NegotiationError::Timeout(ctx.negotiation_timeout.unwrap_or_default());
                report(id, &remote, &ctx, &state_tx, NegotiationState::Failed, Some(error));
                return;
            }
        };

        info!("Supervising link to {} as {:?}", remote, role);
        let mut supervisor = ConnectionSupervisor {
            id,
            negotiation: PeerNegotiation::new(remote, role, link),
            ctx,
            cancel,
            deadline,
            recover_by: None,
            state_tx,
        };

        if role == Role::Offerer {
            let res = guard(
                &supervisor.cancel,
                supervisor.deadline,
                supervisor.negotiation.start_offer(),
            )
            .await;
            supervisor.settle(res).await;
        }

        while !supervisor.negotiation.state().is_terminal() {
            let sleep = expire(supervisor.deadline);
            let recovery = expire(supervisor.recover_by);

            tokio::select! {
                biased;

                _ = supervisor.cancel.cancelled() => {
                    supervisor.negotiation.close().await;
                }

                _ = sleep => {
                    supervisor.time_out().await;
                }

                _ = recovery => {
                    supervisor.recover_by = None;
                    warn!("Link to {} did not recover", supervisor.negotiation.remote());
                    supervisor.link_failed().await;
                }

                cmd = commands.recv() => match cmd {
                    Some(cmd) => supervisor.handle_command(cmd).await,
                    None => supervisor.negotiation.close().await,
                },

                Some(event) = link_rx.recv() => {
                    supervisor.handle_link_event(event).await;
                }
            }

            supervisor.publish(None);
        }

        debug!(
            "Supervisor for {} finished: {}",
            supervisor.negotiation.remote(),
            supervisor.negotiation.state()
        );
    }

    async fn handle_command(&mut self, cmd: SupervisorCommand) {
        match cmd {
            SupervisorCommand::RemoteOffer(sdp) => {
                let res = guard(&self.cancel, self.deadline, self.negotiation.accept_offer(sdp)).await;
                self.settle(res).await;
            }
            SupervisorCommand::RemoteAnswer(sdp) => {
                let res = guard(&self.cancel, self.deadline, self.negotiation.accept_answer(sdp))
                    .await
                    .map(|r| r.map(|()| None));
                self.settle(res).await;
            }
            SupervisorCommand::RemoteCandidate(candidate) => {
                let res = guard(
                    &self.cancel,
                    self.deadline,
                    self.negotiation.add_remote_candidate(candidate),
                )
                .await
                .map(|r| r.map(|()| None));
                self.settle(res).await;
            }
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::LocalCandidate(candidate) => {
                if let Some(msg) = self.negotiation.local_candidate(candidate) {
                    self.send(msg);
                }
            }
            LinkEvent::RemoteAudio(audio) => {
                if self.negotiation.state().is_terminal() {
                    return;
                }
                let report = PeerAudio {
                    supervisor: self.id,
                    member: self.negotiation.remote().clone(),
                    audio,
                };
                if self.ctx.remote_audio.send(report).is_err() {
                    debug!("Session gone, dropping audio from {}", self.negotiation.remote());
                }
            }
            LinkEvent::Connected => {
                if self.recover_by.take().is_some() {
                    info!("Link to {} recovered", self.negotiation.remote());
                }
                if self.negotiation.link_connected() {
                    info!("Connected to {}", self.negotiation.remote());
                    self.deadline = None;
                }
            }
            LinkEvent::Disconnected => {
                if self.recover_by.is_none() && !self.negotiation.state().is_terminal() {
                    info!(
                        "Link to {} disconnected, waiting {:?} for it to recover",
                        self.negotiation.remote(),
                        self.ctx.disconnect_grace
                    );
                    self.recover_by = Some(Instant::now() + self.ctx.disconnect_grace);
                }
            }
            LinkEvent::Failed => {
                self.recover_by = None;
                self.link_failed().await;
            }
        }
    }

    async fn link_failed(&mut self) {
        if let Some(error) = self.negotiation.link_failed().await {
            self.publish(Some(error));
        }
    }

    /// Apply the outcome of one negotiation step.
    async fn settle(
        &mut self,
        res: Result<Result<Option<SignalMessage>, NegotiationError>, Interrupted>,
    ) {
        match res {
            Ok(Ok(Some(msg))) => {
                self.send(msg);
                self.publish(None);
            }
            Ok(Ok(None)) => self.publish(None),
            Ok(Err(error)) => self.publish(Some(error)),
            Err(Interrupted::Cancelled) => {
                self.negotiation.close().await;
                self.publish(None);
            }
            Err(Interrupted::DeadlineElapsed) => self.time_out().await,
        }
    }

    async fn time_out(&mut self) {
        self.deadline = None;
        if self.negotiation.state().is_terminal() {
            return;
        }
        let timeout = self.ctx.negotiation_timeout.unwrap_or_default();
        let error = self.negotiation.fail(NegotiationError::Timeout(timeout)).await;
        self.publish(Some(error));
    }

    fn send(&self, msg: SignalMessage) {
        if self.ctx.outbound.send(msg).is_err() {
            debug!("Signaling transport gone, dropping frame for {}", self.negotiation.remote());
        }
    }

    /// Report the current state if it changed, or unconditionally with an error.
    fn publish(&self, error: Option<NegotiationError>) {
        let state = self.negotiation.state();
        let changed = *self.state_tx.borrow() != state;
        if !changed && error.is_none() {
            return;
        }
        report(
            self.id,
            self.negotiation.remote(),
            &self.ctx,
            &self.state_tx,
            state,
            error,
        );
    }
}

fn report(
    id: u64,
    remote: &MemberId,
    ctx: &SupervisorContext,
    state_tx: &watch::Sender<NegotiationState>,
    state: NegotiationState,
    error: Option<NegotiationError>,
) {
    state_tx.send_replace(state);
    let _ = ctx.status.send(PeerStatus {
        supervisor: id,
        member: remote.clone(),
        state,
        error,
    });
}

/// Completes at `deadline`, or never.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Run one step unless the supervisor is cancelled or out of time first.
async fn guard<T>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    step: impl Future<Output = T>,
) -> Result<T, Interrupted> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        _ = expire(deadline) => Err(Interrupted::DeadlineElapsed),
        out = step => Ok(out),
    }
}

/// Session-side handle to a running [`ConnectionSupervisor`].
///
/// Dropping the handle cancels the supervisor.
#[derive(Debug)]
pub struct SupervisorHandle {
    id: u64,
    remote: MemberId,
    role: Role,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    state: watch::Receiver<NegotiationState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn remote(&self) -> &MemberId {
        &self.remote
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn remote_offer(&self, sdp: String) {
        self.forward(SupervisorCommand::RemoteOffer(sdp));
    }

    pub fn remote_answer(&self, sdp: String) {
        self.forward(SupervisorCommand::RemoteAnswer(sdp));
    }

    pub fn remote_candidate(&self, candidate: CandidateDescriptor) {
        self.forward(SupervisorCommand::RemoteCandidate(candidate));
    }

    /// Request teardown without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Tear down the link and wait for the supervisor task to finish.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            warn!("Supervisor for {} ended abnormally: {}", self.remote, e);
        }
    }

    /// Wait until `predicate` holds for the state. Returns the final state
    /// if the supervisor finished first.
    pub async fn wait_for(&self, predicate: impl Fn(NegotiationState) -> bool) -> NegotiationState {
        let mut state = self.state.clone();
        let reached = state.wait_for(|s| predicate(*s)).await.map(|s| *s);
        match reached {
            Ok(s) => s,
            Err(_) => *state.borrow(),
        }
    }

    fn forward(&self, cmd: SupervisorCommand) {
        if self.commands.send(cmd).is_err() {
            debug!("Supervisor for {} already finished", self.remote);
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
