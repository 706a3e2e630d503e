use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use log::{debug, warn};

use gatelink_shared::{encode, Instant, PeerMessage, RosterData};

use crate::{error::TransportError, peer::transport::PeerLink, server::PeerSettings};

/// Our view of one configured peer: its link, outbound queue, reconnect
/// backoff and the roster it last published.
pub struct PeerSession {
    settings: PeerSettings,
    link: Option<Box<dyn PeerLink>>,
    identified: bool,
    outbound: VecDeque<Box<[u8]>>,
    max_outbound: usize,
    last_heard: Instant,
    backoff: Duration,
    roster: Option<RosterData>,
    players: BTreeMap<String, String>,
}

impl PeerSession {
    pub fn new(settings: PeerSettings, max_outbound: usize, reconnect_min: Duration) -> Self {
        Self {
            settings,
            link: None,
            identified: false,
            outbound: VecDeque::new(),
            max_outbound,
            last_heard: Instant::default(),
            backoff: reconnect_min,
            roster: None,
            players: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &PeerSettings {
        &self.settings
    }

    /// Whether this side dials the peer, and so owns reconnecting.
    pub fn dials(&self) -> bool {
        self.settings.enabled && self.settings.address.is_some()
    }

    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// Link up and roster received.
    pub fn is_connected(&self) -> bool {
        self.link.is_some() && self.identified
    }

    pub fn attach_link(&mut self, link: Box<dyn PeerLink>, now: Instant) {
        if let Some(mut old) = self.link.replace(link) {
            old.close();
        }
        self.identified = false;
        self.outbound.clear();
        self.last_heard = now;
    }

    /// Records a roster refresh. Returns true if this completed the
    /// connection.
    pub fn identify(&mut self, roster: RosterData, reconnect_min: Duration) -> bool {
        self.players = roster
            .players
            .iter()
            .map(|player| (player.name.clone(), player.zone.clone()))
            .collect();
        self.roster = Some(roster);
        self.backoff = reconnect_min;
        let newly = !self.identified;
        self.identified = true;
        newly
    }

    pub fn roster(&self) -> Option<&RosterData> {
        self.roster.as_ref()
    }

    pub fn public_address(&self) -> Option<&str> {
        self.roster
            .as_ref()
            .and_then(|roster| roster.public_address.as_deref())
    }

    pub fn players(&self) -> &BTreeMap<String, String> {
        &self.players
    }

    pub fn player_joined(&mut self, name: &str, zone: &str) {
        self.players.insert(name.to_string(), zone.to_string());
    }

    pub fn player_left(&mut self, name: &str) {
        self.players.remove(name);
    }

    pub fn heard(&mut self, now: Instant) {
        self.last_heard = now;
    }

    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }

    /// Encodes and queues a message. Fails when there is no link, and drops
    /// the link when the queue overflows.
    pub fn queue(&mut self, message: &PeerMessage) -> Result<(), TransportError> {
        if self.link.is_none() {
            return Err(TransportError::NotConnected {
                peer: self.settings.name.clone(),
            });
        }
        if self.outbound.len() >= self.max_outbound {
            warn!(
                "outbound queue for {} is full ({} messages), dropping the link",
                self.settings.name, self.max_outbound
            );
            self.disconnect();
            return Err(TransportError::QueueOverflow {
                peer: self.settings.name.clone(),
                limit: self.max_outbound,
            });
        }
        let frame = encode(message)?;
        debug!("queued {} for {}", message.command(), self.settings.name);
        self.outbound.push_back(frame);
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Hands every queued frame to the link.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        let Some(link) = self.link.as_mut() else {
            self.outbound.clear();
            return Ok(());
        };
        while let Some(frame) = self.outbound.pop_front() {
            link.send(&frame)?;
        }
        Ok(())
    }

    pub fn receive(&mut self) -> Result<Option<Box<[u8]>>, TransportError> {
        match self.link.as_mut() {
            Some(link) => link.receive(),
            None => Ok(None),
        }
    }

    /// Drops the link. Returns true if there was one.
    pub fn disconnect(&mut self) -> bool {
        self.outbound.clear();
        self.identified = false;
        match self.link.take() {
            Some(mut link) => {
                link.close();
                true
            }
            None => false,
        }
    }

    /// Delay before the next reconnect attempt; doubles each call up to `max`.
    pub fn next_backoff(&mut self, max: Duration) -> Duration {
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(max);
        delay
    }
}
