//! Signaling side of parley: room membership and relay of offers, answers
//! and ICE candidates between the members of a room.

pub mod config;
pub mod error;
pub mod room;
pub mod signaling;
pub mod transport;

pub use config::ServerConfig;
pub use error::SignalingError;
pub use room::{RoomRegistry, RoomSettings};
pub use signaling::{SignalingRouter, SignalingService, app};
pub use transport::{DeliveryError, MemberOutbox};
