use crate::error::SignalingError;
use crate::room::RoomRegistry;
use parley_core::{MemberId, SignalMessage};
use tracing::debug;

/// Relays offers, answers and candidates between members of the same room.
///
/// The router never inspects SDP or candidate payloads; it only checks that
/// source and target share a room and stamps the source on the way through.
#[derive(Clone)]
pub struct SignalingRouter {
    registry: RoomRegistry,
}

impl SignalingRouter {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    pub async fn route(
        &self,
        source: &MemberId,
        message: SignalMessage,
    ) -> Result<(), SignalingError> {
        if !message.is_relayed() {
            return Err(SignalingError::Unroutable(message.kind()));
        }

        let unknown = || SignalingError::UnknownSource(source.clone());
        let room = self.registry.room_of(source).ok_or_else(unknown)?;
        let handle = self.registry.handle(&room).ok_or_else(unknown)?;

        let kind = message.kind();
        match handle.route(source.clone(), message).await {
            Ok(()) => Ok(()),
            // The room retired, so the source is no longer in it.
            Err(SignalingError::RoomUnavailable(_)) => Err(unknown()),
            Err(e) => {
                debug!(room = %room, source = %source, "Rejected {}: {}", kind, e);
                Err(e)
            }
        }
    }
}
