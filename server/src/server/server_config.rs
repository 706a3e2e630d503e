use std::{default::Default, time::Duration};

use gatelink_shared::{DEFAULT_BUCKETS, PROTOCOL_VERSION};

/// Contains Config properties which will be used by the Server
#[derive(Clone)]
pub struct ServerConfig {
    /// Name peers use for this process. Appears as the first segment of
    /// remote endpoint names.
    pub name: String,
    /// Optional cluster identifier published in roster refreshes
    pub cluster: Option<String>,
    /// Address players should be sent to when transferring to this process
    pub public_address: Option<String>,
    /// Address peers on a private network should use
    pub private_address: Option<String>,
    /// Gate state machine and spatial index tuning
    pub gate: GateConfig,
    /// Reservation handshake timing and limits
    pub reservation: ReservationConfig,
    /// Peer sessions
    pub peer: PeerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "server".to_string(),
            cluster: None,
            public_address: None,
            private_address: None,
            gate: GateConfig::default(),
            reservation: ReservationConfig::default(),
            peer: PeerConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct GateConfig {
    /// Number of hash buckets in each block role index
    pub index_buckets: usize,
    /// Slack added to a temporary gate's age when deciding if it expired
    pub auto_close_grace: Duration,
    /// Attempts made when searching a volume for a landing spot
    pub spawn_search_budget: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            index_buckets: DEFAULT_BUCKETS,
            auto_close_grace: Duration::from_millis(250),
            spawn_search_budget: 1000,
        }
    }
}

#[derive(Clone)]
pub struct ReservationConfig {
    /// How long a sender waits for the destination to answer
    pub arrival_window: Duration,
    /// How long a destination waits for an approved player to show up
    pub arrival_timeout: Duration,
    /// Outstanding reservations allowed per peer, in each direction
    pub max_pending_per_peer: usize,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            arrival_window: Duration::from_secs(10),
            arrival_timeout: Duration::from_secs(30),
            max_pending_per_peer: 64,
        }
    }
}

/// A remote process this server exchanges travelers with
#[derive(Clone, Debug)]
pub struct PeerSettings {
    pub name: String,
    /// Address to dial. Peers without one are only accepted, never dialled.
    pub address: Option<String>,
    pub enabled: bool,
}

impl PeerSettings {
    pub fn dial(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: Some(address.into()),
            enabled: true,
        }
    }

    pub fn accept(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            enabled: true,
        }
    }
}

#[derive(Clone)]
pub struct PeerConfig {
    pub peers: Vec<PeerSettings>,
    /// Interval between keepalive messages on idle sessions
    pub keepalive_interval: Duration,
    /// Sessions silent for this many keepalive intervals are dropped
    pub idle_intervals: u32,
    /// First reconnect delay, doubled after every failure
    pub reconnect_min: Duration,
    /// Upper bound on the reconnect delay
    pub reconnect_max: Duration,
    /// Messages queued per peer before the session is dropped
    pub max_outbound_queue: usize,
    pub protocol_version: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            keepalive_interval: Duration::from_secs(5),
            idle_intervals: 3,
            reconnect_min: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
            max_outbound_queue: 1024,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}
