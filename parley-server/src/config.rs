//! Server configuration, read from command-line flags with environment
//! fallbacks.

use clap::Parser;
use parley_core::IceServerConfig;
use parley_core::utils::default_ice_servers;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_OUTBOX_CAPACITY: usize = 64;
const DEFAULT_ROOM_MAILBOX: usize = 100;

#[derive(Debug, Clone, Parser)]
#[command(name = "parley-server", about = "Parley audio-room signaling server")]
pub struct ServerConfig {
    /// Address the websocket listener binds to.
    #[arg(long, env = "PARLEY_BIND", default_value_t = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)))]
    pub bind: SocketAddr,

    /// How long the router waits on a saturated member before giving up.
    #[arg(long, env = "PARLEY_DELIVERY_TIMEOUT_MS", default_value_t = DEFAULT_DELIVERY_TIMEOUT_MS)]
    pub delivery_timeout_ms: u64,

    /// Frames buffered per member connection.
    #[arg(long, env = "PARLEY_OUTBOX_CAPACITY", default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    pub outbox_capacity: usize,

    /// Commands buffered per room actor.
    #[arg(long, env = "PARLEY_ROOM_MAILBOX", default_value_t = DEFAULT_ROOM_MAILBOX)]
    pub room_mailbox: usize,

    /// STUN/TURN urls handed to clients. Public STUN servers when empty.
    #[arg(long = "ice-url", env = "TURN_URL", value_delimiter = ',')]
    pub ice_urls: Vec<String>,

    #[arg(long, env = "TURN_USERNAME")]
    pub turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL", hide_env_values = true)]
    pub turn_credential: Option<String>,
}

impl ServerConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        if self.ice_urls.is_empty() {
            return default_ice_servers();
        }

        vec![IceServerConfig {
            urls: self.ice_urls.clone(),
            username: self.turn_username.clone(),
            credential: self.turn_credential.clone(),
        }]
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            delivery_timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            room_mailbox: DEFAULT_ROOM_MAILBOX,
            ice_urls: Vec::new(),
            turn_username: None,
            turn_credential: None,
        }
    }
}
