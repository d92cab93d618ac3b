//! Client side of parley: join a room over the signaling server and keep
//! one negotiated audio link per remote member.

pub mod config;
pub mod error;
pub mod link;
pub mod media;
pub mod session;
pub mod supervisor;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::ClientConfig;
pub use error::{MediaError, NegotiationError, SessionError, TransportError};
pub use link::{LinkEvent, PeerLink, PeerLinkFactory, RtcLinkFactory, SdpKind};
pub use media::{LocalAudioTrack, LocalMedia, MediaCapture, OpusCapture, RemoteAudio};
pub use session::{SessionController, SessionEvent};
pub use supervisor::{ConnectionSupervisor, NegotiationState, Role, SupervisorHandle};
pub use transport::{SignalingTransport, TransportChannels, WsTransport};
