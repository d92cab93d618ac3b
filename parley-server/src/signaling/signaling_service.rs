use crate::config::ServerConfig;
use crate::error::SignalingError;
use crate::room::{RoomRegistry, RoomSettings};
use crate::signaling::SignalingRouter;
use crate::transport::MemberOutbox;
use parley_core::{IceServerConfig, MemberId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

struct SignalingInner {
    registry: RoomRegistry,
    router: SignalingRouter,
    ice_servers: Vec<IceServerConfig>,
    outbox_capacity: usize,
    delivery_timeout: Duration,
}

/// Per-connection entry point: every frame a member sends goes through
/// [`SignalingService::dispatch`].
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: &ServerConfig) -> Self {
        let ice_servers = config.ice_servers();
        let registry = RoomRegistry::new(RoomSettings {
            delivery_timeout: config.delivery_timeout(),
            mailbox: config.room_mailbox,
            ice_servers: ice_servers.clone(),
        });

        Self {
            inner: Arc::new(SignalingInner {
                router: SignalingRouter::new(registry.clone()),
                registry,
                ice_servers,
                outbox_capacity: config.outbox_capacity,
                delivery_timeout: config.delivery_timeout(),
            }),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.inner.registry
    }

    pub fn router(&self) -> &SignalingRouter {
        &self.inner.router
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    /// Assign an identity and an outbox to a freshly accepted connection.
    pub fn open_connection(&self) -> (MemberId, MemberOutbox, mpsc::Receiver<SignalMessage>) {
        let member = MemberId::new();
        let (outbox, rx) = MemberOutbox::channel(member.clone(), self.inner.outbox_capacity);
        info!(member = %member, "Connection opened");
        (member, outbox, rx)
    }

    pub async fn dispatch(&self, member: &MemberId, outbox: &MemberOutbox, msg: SignalMessage) {
        match msg {
            SignalMessage::Join { room } => {
                if let Err(e) = self.inner.registry.join(room, member.clone(), outbox.clone()).await {
                    warn!(member = %member, "Join rejected: {}", e);
                    self.reply(member, outbox, e.to_signal()).await;
                }
            }

            SignalMessage::Leave => {
                if let Err(e) = self.inner.registry.leave(member).await {
                    error!(member = %member, "Leave failed: {}", e);
                }
            }

            relayed @ (SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. }) => {
                if let Err(e) = self.inner.router.route(member, relayed).await {
                    self.reply(member, outbox, e.to_signal()).await;
                }
            }

            other => {
                warn!(member = %member, "Unexpected {} frame from client", other.kind());
                let e = SignalingError::Unroutable(other.kind());
                self.reply(member, outbox, e.to_signal()).await;
            }
        }
    }

    /// The connection is gone: leave its room so peers are told.
    pub async fn disconnect(&self, member: &MemberId) {
        if let Err(e) = self.inner.registry.leave(member).await {
            error!(member = %member, "Failed to release membership: {}", e);
        }
        info!(member = %member, "Connection closed");
    }

    async fn reply(&self, member: &MemberId, outbox: &MemberOutbox, msg: SignalMessage) {
        if let Err(e) = outbox.deliver(msg, self.inner.delivery_timeout).await {
            warn!(member = %member, "Failed to report error to sender: {}", e);
        }
    }
}
