use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::info;
use smol::channel::{self, Receiver, Sender, TryRecvError, TrySendError};

use crate::{
    error::TransportError,
    peer::transport::{PeerLink, PeerTransport},
};

type Listeners = Arc<Mutex<HashMap<String, Sender<ChannelLink>>>>;

/// In-process network of named addresses, for running several servers in
/// one process.
#[derive(Clone, Default)]
pub struct ChannelNetwork {
    listeners: Listeners,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening on `address`, replacing any previous listener.
    pub fn bind(&self, address: &str) -> ChannelTransport {
        let (sender, receiver) = channel::unbounded();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(address.to_string(), sender);
        }
        info!("channel transport listening on {}", address);
        ChannelTransport {
            network: self.clone(),
            incoming: receiver,
        }
    }

    /// Stops accepting new links at `address`. Established links stay up.
    pub fn unbind(&self, address: &str) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(address);
        }
    }
}

pub struct ChannelTransport {
    network: ChannelNetwork,
    incoming: Receiver<ChannelLink>,
}

impl PeerTransport for ChannelTransport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn PeerLink>, TransportError> {
        let connect_failed = || TransportError::ConnectFailed {
            address: address.to_string(),
        };
        let listener = self
            .network
            .listeners
            .lock()
            .map_err(|_| connect_failed())?
            .get(address)
            .cloned()
            .ok_or_else(connect_failed)?;
        let (ours, theirs) = ChannelLink::pair();
        listener.try_send(theirs).map_err(|_| connect_failed())?;
        Ok(Box::new(ours))
    }

    fn accept(&mut self) -> Option<Box<dyn PeerLink>> {
        match self.incoming.try_recv() {
            Ok(link) => Some(Box::new(link)),
            Err(_) => None,
        }
    }
}

/// One end of a bidirectional in-memory link.
pub struct ChannelLink {
    sender: Sender<Box<[u8]>>,
    receiver: Receiver<Box<[u8]>>,
}

impl ChannelLink {
    pub fn pair() -> (ChannelLink, ChannelLink) {
        let (a_sender, a_receiver) = channel::unbounded();
        let (b_sender, b_receiver) = channel::unbounded();
        (
            ChannelLink {
                sender: a_sender,
                receiver: b_receiver,
            },
            ChannelLink {
                sender: b_sender,
                receiver: a_receiver,
            },
        )
    }
}

impl PeerLink for ChannelLink {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self.sender.try_send(frame.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(TransportError::Disconnected),
            Err(TrySendError::Full(_)) => Err(TransportError::SendFailed),
        }
    }

    fn receive(&mut self) -> Result<Option<Box<[u8]>>, TransportError> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(TransportError::Disconnected),
        }
    }

    fn close(&mut self) {
        self.sender.close();
        self.receiver.close();
    }
}
