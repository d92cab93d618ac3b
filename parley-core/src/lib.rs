//! Wire model shared by the Parley signaling server and its clients.

pub mod model;
pub mod utils;

pub use model::*;
