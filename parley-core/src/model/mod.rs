mod member;
mod room;
mod signaling;

pub use member::MemberId;
pub use room::RoomId;
pub use signaling::{CandidateDescriptor, ErrorCode, IceServerConfig, SignalMessage};
