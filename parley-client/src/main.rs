use anyhow::{Context, Result};
use clap::Parser;
use parley_client::{ClientConfig, RemoteAudio, SessionController, SessionEvent};
use parley_core::MemberId;
use parley_core::RoomId;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley-join", about = "Join a parley audio room")]
struct Args {
    /// Signaling server websocket url.
    #[arg(long, env = "PARLEY_URL", default_value = "ws://127.0.0.1:8000/ws")]
    url: String,

    #[arg(long)]
    room: String,

    /// Give up on a peer that has not connected after this many seconds.
    /// Zero waits forever.
    #[arg(long, default_value_t = 30)]
    negotiation_timeout_secs: u64,

    #[arg(long)]
    muted: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        negotiation_timeout: (args.negotiation_timeout_secs > 0)
            .then(|| Duration::from_secs(args.negotiation_timeout_secs)),
        ..ClientConfig::default()
    };

    let mut session = SessionController::websocket(args.url, config);
    session.set_muted(args.muted);

    let peers = session
        .enter_room(RoomId::new(args.room))
        .await
        .context("failed to enter room")?;
    info!("In room with {} peer(s): {:?}", peers.len(), peers);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.leave_room().await;
                break;
            }
            event = session.next_event() => match event? {
                SessionEvent::PeerJoined(member) => info!("{} joined", member.label()),
                SessionEvent::PeerLeft(member) => {
                    info!("{} left, participants: {:?}", member.label(), session.participants());
                }
                SessionEvent::PeerState { member, state, error: None } => {
                    info!("{}: {}", member.label(), state);
                }
                SessionEvent::PeerState { member, state, error: Some(e) } => {
                    warn!("{}: {} ({})", member.label(), state, e);
                }
                SessionEvent::RemoteAudio { member, audio } => {
                    tokio::spawn(drain_audio(member, audio));
                }
                SessionEvent::SignalRejected { code, message, .. } => {
                    warn!("Server rejected a frame ({:?}): {}", code, message);
                }
                SessionEvent::Disconnected => {
                    warn!("Lost the signaling server");
                    break;
                }
            },
        }
    }

    Ok(())
}

/// No playback device here: count what arrives so traffic is visible.
async fn drain_audio(member: MemberId, mut audio: RemoteAudio) {
    info!("Receiving {} from {}", audio.mime_type(), member.label());
    let mut packets = 0u64;
    while audio.recv().await.is_some() {
        packets += 1;
        if packets % 500 == 0 {
            debug!("{} packets from {}", packets, member.label());
        }
    }
    info!("Audio from {} ended after {} packets", member.label(), packets);
}
