use crate::error::SignalingError;
use crate::room::{RoomHandle, RoomSettings};
use crate::transport::MemberOutbox;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{MemberId, RoomId};
use std::sync::Arc;
use tracing::{debug, info};

/// A room can retire between lookup and use; give up after this many fresh
/// actors in a row.
const ROOM_SPAWN_ATTEMPTS: usize = 4;

/// Authoritative record of which member is in which room.
///
/// Each room is served by its own actor, so membership changes and routing
/// lookups for one room are serialized while different rooms proceed
/// independently.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    memberships: Arc<DashMap<MemberId, RoomId>>,
    settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Add `member` to `room` and return the members already present.
    ///
    /// Every other member is sent `PeerJoined`, and the joiner's outbox
    /// receives `Joined` ahead of any message from its peers. A member whose
    /// outbox cannot take the notification is evicted from the room.
    pub async fn join(
        &self,
        room: RoomId,
        member: MemberId,
        outbox: MemberOutbox,
    ) -> Result<Vec<MemberId>, SignalingError> {
        match self.memberships.entry(member.clone()) {
            Entry::Occupied(current) if *current.get() != room => {
                return Err(SignalingError::AlreadyJoined {
                    member,
                    room: current.get().clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(room.clone());
            }
        }

        for _ in 0..ROOM_SPAWN_ATTEMPTS {
            let handle = self.room_handle(&room);
            match handle.join(member.clone(), outbox.clone()).await {
                Ok(peers) => return Ok(peers),
                Err(SignalingError::RoomUnavailable(_)) => {
                    debug!(room = %room, "Room retired during join, retrying");
                    self.reap(&handle);
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    self.memberships.remove_if(&member, |_, r| *r == room);
                    return Err(e);
                }
            }
        }

        self.memberships.remove_if(&member, |_, r| *r == room);
        Err(SignalingError::RoomUnavailable(room))
    }

    /// Remove `member` from its room. Not being joined is not an error.
    pub async fn leave(&self, member: &MemberId) -> Result<(), SignalingError> {
        let Some((_, room)) = self.memberships.remove(member) else {
            return Ok(());
        };
        let Some(handle) = self.handle(&room) else {
            return Ok(());
        };

        match handle.leave(member.clone()).await {
            Ok(_) | Err(SignalingError::RoomUnavailable(_)) => {}
            Err(e) => return Err(e),
        }

        self.reap(&handle);
        Ok(())
    }

    /// Current members of `room`, sorted. Empty for unknown rooms.
    pub async fn members_of(&self, room: &RoomId) -> Vec<MemberId> {
        let Some(handle) = self.handle(room) else {
            return Vec::new();
        };
        handle.members().await.unwrap_or_default()
    }

    pub fn room_of(&self, member: &MemberId) -> Option<RoomId> {
        self.memberships.get(member).map(|r| r.value().clone())
    }

    /// Number of rooms with a live actor.
    pub fn room_count(&self) -> usize {
        self.rooms.iter().filter(|h| !h.value().is_closed()).count()
    }

    pub(crate) fn handle(&self, room: &RoomId) -> Option<RoomHandle> {
        self.rooms
            .get(room)
            .map(|h| h.value().clone())
            .filter(|h| !h.is_closed())
    }

    fn room_handle(&self, room: &RoomId) -> RoomHandle {
        if let Some(handle) = self.handle(room) {
            return handle;
        }

        let mut entry = self.rooms.entry(room.clone()).or_insert_with(|| {
            info!("Creating new room: {}", room);
            RoomHandle::spawn(room.clone(), self.memberships.clone(), self.settings.clone())
        });
        if entry.value().is_closed() {
            info!("Replacing retired room: {}", room);
            *entry.value_mut() =
                RoomHandle::spawn(room.clone(), self.memberships.clone(), self.settings.clone());
        }
        entry.value().clone()
    }

    fn reap(&self, handle: &RoomHandle) {
        let removed = self
            .rooms
            .remove_if(handle.room(), |_, current| {
                current.is_closed() && current.same_room(handle)
            })
            .is_some();
        if removed {
            debug!(room = %handle.room(), "Reclaimed empty room");
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}
