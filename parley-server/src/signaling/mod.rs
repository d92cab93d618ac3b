mod router;
mod signaling_service;
mod ws_handler;

pub use router::*;
pub use signaling_service::*;
pub use ws_handler::*;

use axum::Router;
use axum::routing::get;

/// HTTP surface of the signaling server.
pub fn app(service: SignalingService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(service)
}
