use parley_core::IceServerConfig;
use parley_core::utils::default_ice_servers;
use std::time::Duration;

const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Used when the server does not hand out ICE servers in its join reply.
    pub ice_servers: Vec<IceServerConfig>,
    /// How long `enter_room` waits for the join reply.
    pub join_timeout: Duration,
    /// A peer that has not connected within this window is marked failed.
    /// `None` waits forever.
    pub negotiation_timeout: Option<Duration>,
    /// A disconnected link that has not recovered within this window is
    /// marked failed.
    pub disconnect_grace: Duration,
}

impl ClientConfig {
    /// Server-provided servers win, then configured ones, then public STUN.
    pub fn resolve_ice_servers(&self, from_server: &[IceServerConfig]) -> Vec<IceServerConfig> {
        if !from_server.is_empty() {
            return from_server.to_vec();
        }
        if !self.ice_servers.is_empty() {
            return self.ice_servers.clone();
        }
        default_ice_servers()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            negotiation_timeout: Some(DEFAULT_NEGOTIATION_TIMEOUT),
            disconnect_grace: DEFAULT_DISCONNECT_GRACE,
        }
    }
}
