use crate::error::SignalingError;
use crate::room::room_command::RoomCommand;
use crate::transport::MemberOutbox;
use dashmap::DashMap;
use parley_core::{IceServerConfig, MemberId, RoomId, SignalMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Settings shared by every room actor of a registry.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub delivery_timeout: Duration,
    pub mailbox: usize,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(2),
            mailbox: 100,
            ice_servers: Vec::new(),
        }
    }
}

/// Single-writer actor owning the member set of one room.
///
/// Joins, leaves and routed messages for the room are handled strictly in
/// mailbox order. The actor retires as soon as its last member leaves.
///
/// A member that misses a `PeerJoined` or `PeerLeft` notification is evicted:
/// nobody may address it afterwards, and the others are told it left.
pub struct Room {
    id: RoomId,
    members: BTreeMap<MemberId, MemberOutbox>,
    memberships: Arc<DashMap<MemberId, RoomId>>,
    command_rx: mpsc::Receiver<RoomCommand>,
    settings: RoomSettings,
}

impl Room {
    pub fn new(
        id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        memberships: Arc<DashMap<MemberId, RoomId>>,
        settings: RoomSettings,
    ) -> Self {
        Self {
            id,
            members: BTreeMap::new(),
            memberships,
            command_rx,
            settings,
        }
    }

    pub async fn run(mut self) {
        info!(room = %self.id, "Room event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            if self.handle_command(cmd).await {
                break;
            }
        }

        info!(room = %self.id, "Room event loop finished");
    }

    /// Returns `true` when the room emptied and must retire.
    async fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                member,
                outbox,
                respond_to,
            } => {
                let res = self.join(member, outbox).await;
                let retire = self.close_if_empty();
                let _ = respond_to.send(res);
                retire
            }

            RoomCommand::Leave { member, respond_to } => {
                let was_member = self.leave(&member).await;
                let retire = self.close_if_empty();
                let _ = respond_to.send(was_member);
                retire
            }

            RoomCommand::Route {
                source,
                message,
                respond_to,
            } => {
                let res = self.route(source, message).await;
                let _ = respond_to.send(res);
                false
            }

            RoomCommand::Members { respond_to } => {
                let _ = respond_to.send(self.members.keys().cloned().collect());
                false
            }
        }
    }

    /// Senders must observe the closed mailbox before the command that
    /// emptied the room is acknowledged.
    fn close_if_empty(&mut self) -> bool {
        let retire = self.members.is_empty();
        if retire {
            self.command_rx.close();
        }
        retire
    }

    async fn join(
        &mut self,
        member: MemberId,
        outbox: MemberOutbox,
    ) -> Result<Vec<MemberId>, SignalingError> {
        let peers: Vec<MemberId> = self
            .members
            .keys()
            .filter(|id| **id != member)
            .cloned()
            .collect();
        let rejoin = self.members.contains_key(&member);

        info!(room = %self.id, member = %member, peers = peers.len(), rejoin, "Member joined");

        // The joiner hears about the room before anyone can address it.
        let joined = SignalMessage::Joined {
            room: self.id.clone(),
            member: member.clone(),
            peers: peers.clone(),
            ice_servers: self.settings.ice_servers.clone(),
        };
        if let Err(reason) = outbox.deliver(joined, self.settings.delivery_timeout).await {
            warn!(room = %self.id, member = %member, "Failed to deliver join reply: {}", reason);
            if rejoin {
                self.evict(&member).await;
            } else {
                outbox.evict();
            }
            return Err(SignalingError::DeliveryFailed {
                target: member,
                reason,
            });
        }

        if !rejoin {
            // Inserted first so the joiner also hears about any member the
            // announcement evicts.
            self.members.insert(member.clone(), outbox);
            self.broadcast(
                &member,
                SignalMessage::PeerJoined {
                    member: member.clone(),
                },
            )
            .await;
        }

        Ok(peers)
    }

    async fn leave(&mut self, member: &MemberId) -> bool {
        if self.members.remove(member).is_none() {
            return false;
        }

        info!(room = %self.id, member = %member, remaining = self.members.len(), "Member left");

        self.broadcast(
            member,
            SignalMessage::PeerLeft {
                member: member.clone(),
            },
        )
        .await;
        true
    }

    async fn route(&self, source: MemberId, message: SignalMessage) -> Result<(), SignalingError> {
        if !self.members.contains_key(&source) {
            return Err(SignalingError::UnknownSource(source));
        }

        let Some(target) = message.target().cloned() else {
            return Err(SignalingError::Unroutable(message.kind()));
        };

        let Some(outbox) = self.members.get(&target) else {
            return Err(SignalingError::TargetNotInRoom {
                target,
                room: self.id.clone(),
            });
        };

        let kind = message.kind();
        outbox
            .deliver(message.with_source(source.clone()), self.settings.delivery_timeout)
            .await
            .map_err(|reason| {
                warn!(
                    room = %self.id,
                    source = %source,
                    target = %target,
                    "Dropped {} message: {}",
                    kind,
                    reason
                );
                SignalingError::DeliveryFailed {
                    target: target.clone(),
                    reason,
                }
            })?;

        debug!(room = %self.id, source = %source, target = %target, "Relayed {}", kind);
        Ok(())
    }

    /// Tell every member but `except` about a membership change, evicting
    /// the ones that cannot be told.
    async fn broadcast(&mut self, except: &MemberId, message: SignalMessage) {
        let mut pending = vec![(except.clone(), message)];

        while let Some((except, message)) = pending.pop() {
            let mut unreachable = Vec::new();
            for (id, outbox) in self.members.iter().filter(|(id, _)| **id != except) {
                if let Err(e) = outbox
                    .deliver(message.clone(), self.settings.delivery_timeout)
                    .await
                {
                    warn!(
                        room = %self.id,
                        member = %id,
                        "Failed to deliver {} notification: {}",
                        message.kind(),
                        e
                    );
                    unreachable.push(id.clone());
                }
            }

            for id in unreachable {
                self.remove_unreachable(&id);
                pending.push((id.clone(), SignalMessage::PeerLeft { member: id }));
            }
        }
    }

    /// Drop a member the room can no longer reach and announce its departure.
    async fn evict(&mut self, member: &MemberId) {
        if self.remove_unreachable(member) {
            self.broadcast(
                member,
                SignalMessage::PeerLeft {
                    member: member.clone(),
                },
            )
            .await;
        }
    }

    fn remove_unreachable(&mut self, member: &MemberId) -> bool {
        let Some(outbox) = self.members.remove(member) else {
            return false;
        };
        outbox.evict();
        self.memberships.remove_if(member, |_, room| *room == self.id);
        warn!(room = %self.id, member = %member, remaining = self.members.len(), "Evicted unreachable member");
        true
    }
}

/// Cloneable mailbox address of a running [`Room`].
#[derive(Clone, Debug)]
pub struct RoomHandle {
    room: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawn a room actor on the current runtime. Evicted members are
    /// removed from `memberships`.
    pub fn spawn(
        room: RoomId,
        memberships: Arc<DashMap<MemberId, RoomId>>,
        settings: RoomSettings,
    ) -> Self {
        let (sender, command_rx) = mpsc::channel(settings.mailbox.max(1));
        let actor = Room::new(room.clone(), command_rx, memberships, settings);
        tokio::spawn(actor.run());

        Self { room, sender }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub async fn join(
        &self,
        member: MemberId,
        outbox: MemberOutbox,
    ) -> Result<Vec<MemberId>, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            member,
            outbox,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn leave(&self, member: MemberId) -> Result<bool, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            member,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn route(
        &self,
        source: MemberId,
        message: SignalMessage,
    ) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Route {
            source,
            message,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn members(&self) -> Result<Vec<MemberId>, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Members { respond_to: tx }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), SignalingError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> SignalingError {
        SignalingError::RoomUnavailable(self.room.clone())
    }
}
