
pub use test_member::*;
