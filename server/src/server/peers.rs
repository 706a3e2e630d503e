use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde_json::{json, Value};

use gatelink_shared::{decode, encode, EndpointKey, MessageError, PeerMessage, RosterData};

use crate::{
    endpoint::RemoteEndpoint,
    error::{GateServerError, ProtocolError, ReservationError, TransportError},
    events::{ApiResponse, LinkEdit, Presence, RelayedChat},
    peer::PeerLink,
    server::gate_server::{GateServer, PendingLink, Task},
    world::ZoneWorld,
};

impl GateServer {
    // Public

    /// Sends a chat line to peers. With `to_gates`, only the servers hosting
    /// those endpoints receive it.
    pub fn send_chat(&mut self, player: &str, message: &str, to_gates: Option<Vec<EndpointKey>>) {
        let Some(to_gates) = to_gates else {
            self.broadcast(&PeerMessage::Chat {
                player: player.to_string(),
                message: message.to_string(),
                to_gates: None,
            });
            return;
        };
        let mut by_server: BTreeMap<String, Vec<EndpointKey>> = BTreeMap::new();
        for gate in to_gates {
            if let Some(server) = gate.server() {
                by_server
                    .entry(server.to_string())
                    .or_default()
                    .push(EndpointKey::local(gate.zone(), gate.name()));
            }
        }
        for (server, gates) in by_server {
            let message = PeerMessage::Chat {
                player: player.to_string(),
                message: message.to_string(),
                to_gates: Some(gates),
            };
            if let Err(error) = self.send_to(&server, &message) {
                debug!("chat not relayed to {}: {}", server, error);
            }
        }
    }

    /// Calls `method` on a peer. The answer surfaces as an
    /// `ApiResponseEvent` carrying the returned request id.
    pub fn call_api(
        &mut self,
        peer: &str,
        target: &str,
        method: &str,
        args: BTreeMap<String, String>,
    ) -> Result<u64, TransportError> {
        let request_id = self.api_requests.generate();
        self.send_to(
            peer,
            &PeerMessage::Api {
                request_id,
                target: target.to_string(),
                method: method.to_string(),
                args,
            },
        )?;
        Ok(request_id)
    }

    pub fn player_quit(&mut self, name: &str) {
        self.registry.deselect(name);
        self.broadcast(&PeerMessage::PlayerQuit {
            name: name.to_string(),
        });
    }

    pub fn player_kicked(&mut self, name: &str, reason: &str) {
        self.broadcast(&PeerMessage::PlayerKicked {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn player_changed_zone(&mut self, name: &str, zone: &str) {
        self.broadcast(&PeerMessage::PlayerChangedWorld {
            name: name.to_string(),
            zone: zone.to_string(),
        });
    }

    // Crate-public

    /// Queues a message for a connected peer.
    pub(crate) fn send_to(&mut self, peer: &str, message: &PeerMessage) -> Result<(), TransportError> {
        let Some(session) = self.peers.get_mut(peer) else {
            return Err(TransportError::UnknownPeer {
                peer: peer.to_string(),
            });
        };
        if !session.is_connected() {
            return Err(TransportError::NotConnected {
                peer: peer.to_string(),
            });
        }
        session.queue(message)
    }

    pub(crate) fn broadcast(&mut self, message: &PeerMessage) {
        for session in self.peers.values_mut().filter(|session| session.is_connected()) {
            if let Err(error) = session.queue(message) {
                warn!("could not queue {} for {}: {}", message.command(), session.name(), error);
            }
        }
    }

    pub(crate) fn roster(&self, world: &dyn ZoneWorld) -> RosterData {
        RosterData {
            server_name: self.config.name.clone(),
            cluster: self.config.cluster.clone(),
            protocol_version: self.config.peer.protocol_version,
            public_address: self.config.public_address.clone(),
            private_address: self.config.private_address.clone(),
            zones: world.zones(),
            players: world.online_players(),
            endpoints: self
                .registry
                .local_endpoints()
                .map(|endpoint| endpoint.summary())
                .collect(),
        }
    }

    // Tick

    pub(super) fn accept_links(&mut self) {
        let now = self.clock.now();
        while let Some(link) = self.transport.accept() {
            debug!("accepted a peer link, waiting for it to identify");
            self.pending_links.push(PendingLink { link, accepted_at: now });
        }
    }

    /// Reads the first frame of each accepted link, which must name a
    /// configured peer.
    pub(super) fn poll_pending_links(&mut self, world: &mut dyn ZoneWorld) {
        let now = self.clock.now();
        let idle = self.config.peer.keepalive_interval * self.config.peer.idle_intervals;
        let pending = std::mem::take(&mut self.pending_links);
        for mut pending_link in pending {
            let frame = match pending_link.link.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if pending_link.accepted_at.elapsed(&now) < idle {
                        self.pending_links.push(pending_link);
                    } else {
                        debug!("dropping a peer link that never identified itself");
                        pending_link.link.close();
                    }
                    continue;
                }
                Err(_) => continue,
            };
            match decode(&frame) {
                Ok(PeerMessage::Refresh {
                    server_name,
                    protocol_version,
                }) => self.identify_link(world, pending_link.link, &server_name, protocol_version),
                Ok(message) => {
                    let error = ProtocolError::NotIdentified {
                        peer: "<unidentified>".to_string(),
                        command: message.command(),
                    };
                    reject_link(pending_link.link, &error);
                    self.incoming_events.push_error(error.into());
                }
                Err(source) => {
                    let error = ProtocolError::Malformed {
                        peer: "<unidentified>".to_string(),
                        source,
                    };
                    reject_link(pending_link.link, &error);
                    self.incoming_events.push_error(error.into());
                }
            }
        }
    }

    /// Drains every peer link and dispatches what arrived.
    pub(super) fn poll_peers(&mut self, world: &mut dyn ZoneWorld) {
        let now = self.clock.now();
        let mut inbox: Vec<(String, Result<PeerMessage, MessageError>)> = Vec::new();
        let mut lost = Vec::new();
        for (name, session) in self.peers.iter_mut() {
            loop {
                match session.receive() {
                    Ok(Some(frame)) => {
                        session.heard(now);
                        inbox.push((name.clone(), decode(&frame)));
                    }
                    Ok(None) => break,
                    Err(error) => {
                        debug!("link to {} failed: {}", name, error);
                        lost.push(name.clone());
                        break;
                    }
                }
            }
            if !session.has_link() && self.online.contains(name) {
                lost.push(name.clone());
            }
        }

        for (peer, message) in inbox {
            if lost.contains(&peer) {
                continue;
            }
            match message {
                Ok(message) => self.handle_message(world, &peer, message),
                Err(source) => {
                    let error = ProtocolError::Malformed {
                        peer: peer.clone(),
                        source,
                    };
                    self.protocol_error(&peer, error);
                }
            }
        }

        lost.dedup();
        for peer in lost {
            self.peer_lost(world, &peer);
        }
    }

    pub(super) fn flush_peers(&mut self) {
        for session in self.peers.values_mut() {
            if let Err(error) = session.flush() {
                warn!("flushing to {} failed: {}", session.name(), error);
                session.disconnect();
            }
        }
    }

    /// Dials a peer we own the connection to.
    pub(super) fn reconnect_peer(&mut self, peer: &str) {
        let now = self.clock.now();
        let reconnect_max = self.config.peer.reconnect_max;
        let name = self.config.name.clone();
        let version = self.config.peer.protocol_version;
        let Some(session) = self.peers.get_mut(peer) else {
            return;
        };
        if session.has_link() || !session.dials() {
            return;
        }
        let Some(address) = session.settings().address.clone() else {
            return;
        };
        match self.transport.connect(&address) {
            Ok(link) => {
                info!("connected to {} at {}", peer, address);
                session.attach_link(link, now);
                let hello = PeerMessage::Refresh {
                    server_name: name,
                    protocol_version: version,
                };
                if let Err(error) = session.queue(&hello) {
                    warn!("could not greet {}: {}", peer, error);
                }
            }
            Err(error) => {
                let delay = session.next_backoff(reconnect_max);
                debug!("connecting to {} failed ({}), retrying in {:?}", peer, error, delay);
                self.schedule(now.add(delay), Task::PeerReconnect(peer.to_string()));
            }
        }
    }

    /// Pings every linked peer and drops the ones that went quiet.
    pub(super) fn keepalive(&mut self, world: &mut dyn ZoneWorld) {
        let now = self.clock.now();
        let idle = self.config.peer.keepalive_interval * self.config.peer.idle_intervals;
        let mut silent = Vec::new();
        for (name, session) in self.peers.iter_mut().filter(|(_, session)| session.has_link()) {
            if session.last_heard().elapsed(&now) > idle {
                warn!("{} has been silent for {:?}, dropping it", name, idle);
                silent.push(name.clone());
                continue;
            }
            if let Err(error) = session.queue(&PeerMessage::Ping { time: now.as_millis() }) {
                debug!("ping to {} failed: {}", name, error);
            }
        }
        for peer in silent {
            self.peer_lost(world, &peer);
        }
        self.schedule(now.add(self.config.peer.keepalive_interval), Task::PeerKeepalive);
    }

    // Private

    fn identify_link(&mut self, world: &mut dyn ZoneWorld, link: Box<dyn PeerLink>, peer: &str, version: u32) {
        if !self.peers.contains_key(peer) {
            let error = ProtocolError::UnknownPeer {
                server: peer.to_string(),
            };
            reject_link(link, &error);
            self.incoming_events.push_error(error.into());
            return;
        }
        if version != self.config.peer.protocol_version {
            let error = ProtocolError::VersionMismatch {
                peer: peer.to_string(),
                theirs: version,
                ours: self.config.peer.protocol_version,
            };
            reject_link(link, &error);
            self.incoming_events.push_error(error.into());
            return;
        }
        if self.online.contains(peer) {
            self.peer_lost(world, peer);
        }
        let now = self.clock.now();
        let hello = PeerMessage::Refresh {
            server_name: self.config.name.clone(),
            protocol_version: self.config.peer.protocol_version,
        };
        let roster = PeerMessage::RefreshData(self.roster(world));
        let Some(session) = self.peers.get_mut(peer) else {
            return;
        };
        info!("{} connected to us", peer);
        session.attach_link(link, now);
        for message in [hello, roster] {
            if let Err(error) = session.queue(&message) {
                warn!("could not answer {}: {}", peer, error);
            }
        }
    }

    fn handle_message(&mut self, world: &mut dyn ZoneWorld, peer: &str, message: PeerMessage) {
        debug!("received {} from {}", message.command(), peer);
        let identified = self.peers.get(peer).is_some_and(|session| session.is_connected());
        match message {
            PeerMessage::Refresh {
                server_name,
                protocol_version,
            } => {
                if server_name != peer || protocol_version != self.config.peer.protocol_version {
                    let error = ProtocolError::VersionMismatch {
                        peer: peer.to_string(),
                        theirs: protocol_version,
                        ours: self.config.peer.protocol_version,
                    };
                    self.protocol_error(peer, error);
                    self.peer_lost(world, peer);
                    return;
                }
                let roster = PeerMessage::RefreshData(self.roster(world));
                self.queue_raw(peer, &roster);
            }
            PeerMessage::RefreshData(roster) => self.apply_roster(world, peer, roster),
            PeerMessage::Ping { time } => self.queue_raw(peer, &PeerMessage::Pong { time }),
            PeerMessage::Pong { .. } | PeerMessage::Nop => {}
            PeerMessage::Error { message } => {
                warn!("{} reported an error: {}", peer, message);
                self.incoming_events.push_error(
                    ProtocolError::Remote {
                        peer: peer.to_string(),
                        message,
                    }
                    .into(),
                );
            }
            message if !identified => {
                let error = ProtocolError::NotIdentified {
                    peer: peer.to_string(),
                    command: message.command(),
                };
                self.protocol_error(peer, error);
            }
            PeerMessage::EndpointAdded { endpoint } => {
                self.registry.upsert_remote(RemoteEndpoint::from_summary(peer, &endpoint));
            }
            PeerMessage::EndpointRenamed { old_key, new_name } => {
                let old = old_key.qualified(peer);
                self.registry.rename_remote(&old, &new_name);
            }
            PeerMessage::EndpointRemoved { endpoint } => {
                self.registry.remove(&endpoint.qualified(peer));
            }
            PeerMessage::EndpointDestroyed { endpoint } => {
                self.registry.destroy_remote(&endpoint.qualified(peer));
            }
            PeerMessage::EndpointAttach { to, from } => {
                let to = self.localize(&to);
                self.attach(world, &to, &from);
            }
            PeerMessage::EndpointDetach { to, from } => {
                let to = self.localize(&to);
                self.detach(world, &to, &from);
            }
            PeerMessage::Reservation(payload) => self.receive_reservation(world, peer, payload),
            PeerMessage::ReservationApproved { id } => self.reservation_approved(world, peer, id),
            PeerMessage::ReservationDenied { id, reason } => self.reservation_denied(world, peer, id, reason),
            PeerMessage::ReservationArrived { id } => self.reservation_arrived(world, peer, id),
            PeerMessage::ReservationTimeout { id, from_sender } => {
                self.reservation_timeout(world, peer, id, from_sender)
            }
            PeerMessage::LinkAdd { player, from, to } => self.apply_link_edit(world, peer, player, from, to, true),
            PeerMessage::LinkRemove { player, from, to } => {
                self.apply_link_edit(world, peer, player, from, to, false)
            }
            PeerMessage::LinkAddComplete { player, from, to } => {
                self.incoming_events.push_link_edit(LinkEdit {
                    server: peer.to_string(),
                    player,
                    from,
                    to,
                    added: true,
                });
            }
            PeerMessage::LinkRemoveComplete { player, from, to } => {
                self.incoming_events.push_link_edit(LinkEdit {
                    server: peer.to_string(),
                    player,
                    from,
                    to,
                    added: false,
                });
            }
            PeerMessage::Chat {
                player,
                message,
                to_gates,
            } => {
                let to_gates = to_gates.map(|gates| gates.iter().map(|gate| self.localize(gate)).collect::<Vec<_>>());
                self.incoming_events.push_chat(RelayedChat {
                    server: peer.to_string(),
                    player,
                    message,
                    to_gates,
                });
            }
            PeerMessage::PlayerJoined { name, zone } => {
                if let Some(session) = self.peers.get_mut(peer) {
                    session.player_joined(&name, &zone);
                }
                self.incoming_events.push_presence(Presence::Joined {
                    server: peer.to_string(),
                    name,
                    zone,
                });
            }
            PeerMessage::PlayerQuit { name } => {
                if let Some(session) = self.peers.get_mut(peer) {
                    session.player_left(&name);
                }
                self.incoming_events.push_presence(Presence::Quit {
                    server: peer.to_string(),
                    name,
                });
            }
            PeerMessage::PlayerKicked { name, reason } => {
                if let Some(session) = self.peers.get_mut(peer) {
                    session.player_left(&name);
                }
                self.incoming_events.push_presence(Presence::Kicked {
                    server: peer.to_string(),
                    name,
                    reason,
                });
            }
            PeerMessage::PlayerChangedWorld { name, zone } => {
                if let Some(session) = self.peers.get_mut(peer) {
                    session.player_joined(&name, &zone);
                }
                self.incoming_events.push_presence(Presence::ChangedWorld {
                    server: peer.to_string(),
                    name,
                    zone,
                });
            }
            PeerMessage::Api {
                request_id,
                target,
                method,
                args,
            } => {
                let (result, error) = match self.answer_api(world, &target, &method, &args) {
                    Ok(value) => (Some(value), None),
                    Err(error) => (None, Some(error)),
                };
                let reply = PeerMessage::ApiResult {
                    request_id,
                    result,
                    error,
                };
                self.queue_raw(peer, &reply);
            }
            PeerMessage::ApiResult {
                request_id,
                result,
                error,
            } => {
                let result = match error {
                    Some(error) => Err(error),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                self.incoming_events.push_api_response(ApiResponse {
                    server: peer.to_string(),
                    request_id,
                    result,
                });
            }
        }
    }

    /// Replaces our cache of the peer's endpoints and completes the
    /// handshake.
    fn apply_roster(&mut self, world: &mut dyn ZoneWorld, peer: &str, roster: RosterData) {
        if roster.server_name != peer {
            let error = ProtocolError::UnknownPeer {
                server: roster.server_name,
            };
            self.protocol_error(peer, error);
            return;
        }
        let fresh: Vec<RemoteEndpoint> = roster
            .endpoints
            .iter()
            .map(|summary| RemoteEndpoint::from_summary(peer, summary))
            .collect();
        for stale in self.registry.remote_keys_on(peer) {
            if !fresh.iter().any(|endpoint| endpoint.key() == &stale) {
                self.registry.remove(&stale);
            }
        }
        for endpoint in fresh {
            self.registry.upsert_remote(endpoint);
        }

        let reconnect_min = self.config.peer.reconnect_min;
        let Some(session) = self.peers.get_mut(peer) else {
            return;
        };
        if !session.identify(roster, reconnect_min) {
            return;
        }
        info!("peer {} is online", peer);
        self.online.insert(peer.to_string());
        self.incoming_events.push_peer_connection(peer);

        // open gates pointing at the peer tell it again that they are inbound
        let reattach: Vec<(EndpointKey, EndpointKey)> = self
            .registry
            .local_endpoints()
            .filter_map(|endpoint| {
                let gate = endpoint.gate()?;
                let outgoing = gate.outgoing()?;
                (gate.is_open() && outgoing.server() == Some(peer))
                    .then(|| (endpoint.key().clone(), outgoing.clone()))
            })
            .collect();
        for (from, to) in reattach {
            self.attach(world, &to, &from);
        }
    }

    /// Tears down everything bound to a peer whose link went away.
    pub(super) fn peer_lost(&mut self, world: &mut dyn ZoneWorld, peer: &str) {
        let now = self.clock.now();
        let reconnect_max = self.config.peer.reconnect_max;
        let Some(session) = self.peers.get_mut(peer) else {
            return;
        };
        session.disconnect();
        let dials = session.dials();
        let delay = session.next_backoff(reconnect_max);
        if self.online.remove(peer) {
            info!("peer {} went offline", peer);
            self.incoming_events.push_peer_disconnection(peer);
        }

        for id in self.reservations.ids_for_peer(peer) {
            let outbound = self.reservations.get(id).is_some_and(|reservation| reservation.is_outbound());
            if outbound {
                self.fail_reservation(world, id, ReservationError::TimedOut);
            } else if let Some(reservation) = self.reservations.retire(id) {
                if let Some(name) = reservation.traveler.player_name() {
                    self.expected_players.remove(name);
                }
            }
        }

        let mut affected: Vec<EndpointKey> = self
            .registry
            .local_endpoints()
            .filter(|endpoint| {
                endpoint
                    .gate()
                    .and_then(|gate| gate.outgoing())
                    .is_some_and(|outgoing| outgoing.server() == Some(peer))
            })
            .map(|endpoint| endpoint.key().clone())
            .collect();
        // the peer's gates attach again from its roster once it is back
        for key in self.release_incoming(|origin| origin.server() == Some(peer)) {
            if !affected.contains(&key) {
                affected.push(key);
            }
        }
        for key in affected {
            self.check_auto_close(world, &key);
        }

        if dials {
            self.schedule(now.add(delay), Task::PeerReconnect(peer.to_string()));
        }
    }

    fn apply_link_edit(
        &mut self,
        world: &mut dyn ZoneWorld,
        peer: &str,
        player: Option<String>,
        from: EndpointKey,
        to: EndpointKey,
        add: bool,
    ) {
        let result = if add {
            self.add_link(world, player.as_deref(), &from, &to)
        } else {
            self.remove_link(world, &from, &to)
        };
        let reply = match result {
            Ok(_) => {
                let from = self.localize(&from).qualified(&self.config.name);
                let to = EndpointKey::local(to.zone(), to.name());
                if add {
                    PeerMessage::LinkAddComplete { player, from, to }
                } else {
                    PeerMessage::LinkRemoveComplete { player, from, to }
                }
            }
            Err(error) => {
                warn!("link edit from {} failed: {}", peer, error);
                PeerMessage::Error {
                    message: error.to_string(),
                }
            }
        };
        self.queue_raw(peer, &reply);
    }

    fn answer_api(
        &self,
        world: &dyn ZoneWorld,
        target: &str,
        method: &str,
        _args: &BTreeMap<String, String>,
    ) -> Result<Value, String> {
        match method {
            "zone.time" => world
                .zone_time(target)
                .map(Value::from)
                .ok_or_else(|| format!("unknown zone '{}'", target)),
            "server.players" => serde_json::to_value(world.online_players()).map_err(|error| error.to_string()),
            "endpoint.info" => {
                let key = self
                    .registry
                    .find(target)
                    .ok_or_else(|| format!("unknown endpoint '{}'", target))?;
                let endpoint = self
                    .registry
                    .local(&key)
                    .ok_or_else(|| format!("'{}' is not hosted here", target))?;
                let summary = serde_json::to_value(endpoint.summary()).map_err(|error| error.to_string())?;
                let links: Vec<String> = endpoint
                    .gate()
                    .map(|gate| gate.links().iter().map(ToString::to_string).collect())
                    .unwrap_or_default();
                let outgoing = endpoint.gate().and_then(|gate| gate.outgoing()).map(ToString::to_string);
                Ok(json!({
                    "endpoint": summary,
                    "links": links,
                    "outgoing": outgoing,
                }))
            }
            _ => Err(format!("unknown method '{}'", method)),
        }
    }

    /// Queues on any linked session, identified or not.
    fn queue_raw(&mut self, peer: &str, message: &PeerMessage) {
        if let Some(session) = self.peers.get_mut(peer) {
            if let Err(error) = session.queue(message) {
                warn!("could not queue {} for {}: {}", message.command(), peer, error);
            }
        }
    }

    /// Logs a protocol error, reports it to the peer and surfaces it.
    pub(super) fn protocol_error(&mut self, peer: &str, error: ProtocolError) {
        warn!("{}", error);
        self.queue_raw(
            peer,
            &PeerMessage::Error {
                message: error.to_string(),
            },
        );
        self.incoming_events.push_error(GateServerError::Protocol(error));
    }
}

fn reject_link(mut link: Box<dyn PeerLink>, error: &ProtocolError) {
    warn!("rejecting peer link: {}", error);
    let message = PeerMessage::Error {
        message: error.to_string(),
    };
    if let Ok(frame) = encode(&message) {
        let _ = link.send(&frame);
    }
    link.close();
}
