mod outbox;

pub use outbox::*;
