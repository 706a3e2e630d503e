use crate::error::TransportError;

/// One ordered, framed connection to another process.
pub trait PeerLink {
    /// Queues a frame for delivery.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next received frame, if one is waiting. Fails with
    /// `TransportError::Disconnected` once the far end went away.
    fn receive(&mut self) -> Result<Option<Box<[u8]>>, TransportError>;

    fn close(&mut self);
}

/// Opens links to peers and accepts links opened by peers.
pub trait PeerTransport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn PeerLink>, TransportError>;

    /// A newly accepted link, if any. Accepted links are anonymous until the
    /// peer introduces itself.
    fn accept(&mut self) -> Option<Box<dyn PeerLink>>;
}
