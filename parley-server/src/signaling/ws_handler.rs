use crate::SignalingService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use parley_core::SignalMessage;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: SignalingService) {
    let (member, outbox, mut rx) = service.open_connection();
    info!("New WebSocket connection: {}", member);

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn({
        let member = member.clone();
        let outbox = outbox.clone();
        async move {
            loop {
                let msg = tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                    _ = outbox.evicted() => {
                        warn!("Room evicted {}, closing connection", member);
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode {} for {}: {}", msg.kind(), member, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let member = member.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<SignalMessage>(text.as_str()) {
                            Ok(signal) => service.dispatch(&member, &outbox, signal).await,
                            Err(e) => warn!("Invalid SignalMessage from {}: {}", member, e),
                        }
                    }
                    Message::Close(_) => break,
                    _ => debug!("Ignoring non-text frame from {}", member),
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.disconnect(&member).await;
    info!("WebSocket disconnected: {}", member);
}
