mod channel;
mod session;
mod transport;

pub use channel::{ChannelLink, ChannelNetwork, ChannelTransport};
pub use session::PeerSession;
pub use transport::{PeerLink, PeerTransport};
