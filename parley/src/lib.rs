//! Parley: audio rooms brokered by a signaling server, with audio flowing
//! directly between members.
//!
//! `server` pulls in the room registry and websocket signaling service,
//! `client` the session controller and peer negotiation.

pub use parley_core::{MemberId, RoomId, SignalMessage};

pub mod model {
    pub use parley_core::model::*;
    pub use parley_core::utils::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use parley_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use parley_client::*;
}
