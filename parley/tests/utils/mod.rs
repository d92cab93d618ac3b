
pub use loopback::*;
pub use test_room::*;
