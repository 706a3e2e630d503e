mod gate_server;
pub use gate_server::GateServer;

mod server_config;
pub use server_config::{GateConfig, PeerConfig, PeerSettings, ReservationConfig, ServerConfig};

mod links;
mod peers;
mod travel;
mod zones;
