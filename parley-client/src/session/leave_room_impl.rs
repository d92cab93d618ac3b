use crate::session::SessionController;
use parley_core::SignalMessage;
use tracing::{debug, info};

impl SessionController {
    /// Close every peer link, stop capture and leave the room.
    ///
    /// Calling this when not in a room does nothing.
    pub async fn leave_room(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if session.ctx.outbound.send(SignalMessage::Leave).is_err() {
            debug!("Signaling transport already closed");
        }
        info!("Leaving room {}", session.room);
        self.teardown().await;
    }

    /// Release everything held for the current room.
    pub(crate) async fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        for (_, mut handle) in std::mem::take(&mut session.supervisors) {
            handle.close().await;
        }
        session.media.release();
        // Dropping the session drops the outbound sender, which closes the
        // transport.
    }
}
