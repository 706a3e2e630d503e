use log::{debug, info, warn};

use gatelink_shared::{
    BlockCoord, BlockRole, Direction, EndpointKey, Location, PeerMessage, ReservationPayload,
    TravelerIdentity, TravelerSnapshot, Vector,
};

use crate::{
    endpoint::{EndpointPolicy, RouteTier},
    error::{ProtocolError, ReservationError},
    events::{Arrival, Denial, Departure},
    reservation::{
        check_arrival, check_departure, format_message, ArrivalPlan, MessageTokens, Reservation,
        ReservationSide, ReservationState,
    },
    server::gate_server::{Destination, GateServer, Task},
    spawn::{landing_yaw, launch_velocity, resolve_landing, settle_velocity},
    world::ZoneWorld,
};

impl GateServer {
    // Public

    /// Sends a traveler through the open gate `from` towards its selected
    /// destination. Returns the reservation id; local crossings have already
    /// completed when this returns.
    pub fn depart(
        &mut self,
        world: &mut dyn ZoneWorld,
        traveler: &TravelerIdentity,
        from: &EndpointKey,
    ) -> Result<u64, ReservationError> {
        let from = self.localize(from);
        let Some(gate) = self.registry.gate(&from) else {
            return Err(ReservationError::NoDestination);
        };
        if !gate.is_open() {
            return Err(ReservationError::GateClosed);
        }
        let Some(to) = gate.outgoing().cloned() else {
            return Err(ReservationError::NoDestination);
        };
        self.start_crossing(world, traveler, Some(from), to)
    }

    /// Sends a traveler standing in an open portal block. None when no open
    /// gate owns the block.
    pub fn enter_portal(
        &mut self,
        world: &mut dyn ZoneWorld,
        traveler: &TravelerIdentity,
        zone: &str,
        coord: BlockCoord,
    ) -> Option<Result<u64, ReservationError>> {
        let from = self.portal_at(zone, coord)?.clone();
        if self.reservations.for_identity(traveler).is_some_and(|pending| {
            pending.departure.as_ref() == Some(&from) && !pending.state().is_terminal()
        }) {
            // still standing in the portal while the crossing is in flight
            return None;
        }
        Some(self.depart(world, traveler, &from))
    }

    /// Sends a traveler straight to an endpoint, with no departure gate.
    pub fn teleport(
        &mut self,
        world: &mut dyn ZoneWorld,
        traveler: &TravelerIdentity,
        to: &EndpointKey,
    ) -> Result<u64, ReservationError> {
        let to = self.localize(to);
        self.start_crossing(world, traveler, None, to)
    }

    /// A player connected to this process. Completes a crossing waiting on
    /// them and tells peers.
    pub fn player_joined(&mut self, world: &mut dyn ZoneWorld, name: &str, zone: &str) {
        self.broadcast(&PeerMessage::PlayerJoined {
            name: name.to_string(),
            zone: zone.to_string(),
        });
        if let Some(id) = self.expected_players.remove(name) {
            self.complete_inbound(world, id);
        }
    }

    // Sending side

    fn start_crossing(
        &mut self,
        world: &mut dyn ZoneWorld,
        identity: &TravelerIdentity,
        departure: Option<EndpointKey>,
        arrival: EndpointKey,
    ) -> Result<u64, ReservationError> {
        let Some(snapshot) = world.snapshot(identity) else {
            return Err(ReservationError::TravelerGone);
        };
        let now = self.clock.now();
        let id = self.reservations.next_id();
        let side = match arrival.server() {
            Some(server) => ReservationSide::Outbound {
                peer: server.to_string(),
            },
            None => ReservationSide::Local,
        };
        let mut reservation = Reservation::new(id, side, Some(identity.clone()), snapshot, now);
        reservation.departure_direction = departure
            .as_ref()
            .and_then(|key| self.registry.local(key))
            .map(|endpoint| endpoint.direction());
        reservation.departure = departure.clone();
        reservation.arrival = Some(arrival.clone());
        reservation.destination_server = arrival.server().map(str::to_string);
        if let Some(displaced) = self.reservations.insert(reservation) {
            debug!(
                "reservation {} for {} superseded by {}",
                displaced.local_id(),
                identity,
                id
            );
        }

        let tier = self.route_tier(departure.as_ref(), &arrival);
        let Some(reservation) = self.reservations.get(id) else {
            return Err(ReservationError::TravelerGone);
        };
        let checked = check_departure(
            &reservation.traveler,
            departure.as_ref().and_then(|key| self.registry.local(key)),
            &arrival,
            self.registry.local(&arrival),
            tier,
            self.permissions.as_ref(),
            self.economy.as_ref(),
        );
        let cost = match checked {
            Ok(cost) => cost,
            Err(reason) => return Err(self.fail_reservation(world, id, reason)),
        };
        if let Some(reservation) = self.reservations.get_mut(id) {
            reservation.send_cost = cost;
            let _ = reservation.advance(ReservationState::DepartureChecked, "depart");
        }

        match self.resolve(&arrival) {
            Some(Destination::Local(_)) => self.complete_local(world, id).map(|_| id),
            Some(Destination::Remote { server, .. }) => self.send_outbound(world, id, &server).map(|_| id),
            None => {
                let reason = match arrival.server() {
                    Some(server) => ReservationError::ServerOffline {
                        server: server.to_string(),
                    },
                    None => ReservationError::NoDestination,
                };
                Err(self.fail_reservation(world, id, reason))
            }
        }
    }

    /// Both endpoints are hosted here: arrival checks, landing and
    /// relocation all happen now.
    fn complete_local(&mut self, world: &mut dyn ZoneWorld, id: u64) -> Result<(), ReservationError> {
        let Some(reservation) = self.reservations.get(id) else {
            return Err(ReservationError::TravelerGone);
        };
        let (Some(identity), Some(arrival)) = (reservation.identity.clone(), reservation.arrival.clone()) else {
            return Err(self.fail_reservation(world, id, ReservationError::NoDestination));
        };
        let departure = reservation.departure.clone();
        let departure_direction = reservation.departure_direction;
        let traveler = reservation.traveler.clone();
        let send_cost = reservation.send_cost;
        let tier = self.route_tier(departure.as_ref(), &arrival);

        let Some(endpoint) = self.registry.local(&arrival) else {
            return Err(self.fail_reservation(world, id, ReservationError::NoDestination));
        };
        // the receive cost was already folded into the departure cost
        let plan = match check_arrival(
            &traveler,
            endpoint,
            tier,
            false,
            self.permissions.as_ref(),
            self.economy.as_ref(),
        ) {
            Ok(plan) => plan,
            Err(reason) => return Err(self.fail_reservation(world, id, reason)),
        };
        let Some(landing) = resolve_landing(endpoint, world, self.config.gate.spawn_search_budget, &mut self.rng) else {
            return Err(self.fail_reservation(world, id, ReservationError::NoLanding));
        };
        let policy = endpoint.policy.clone();
        let (location, velocity) = landing_point(world, &traveler, departure_direction, landing.location, landing.facing);

        if !world.relocate(&identity, &location, velocity) {
            return Err(self.fail_reservation(world, id, ReservationError::TravelerGone));
        }
        apply_plan(world, &identity, &policy, &plan, &traveler, false);
        if let Some(player) = traveler.player_name() {
            if send_cost > 0.0 && !self.economy.debit(player, send_cost) {
                warn!("{} moved but could not be charged {}", player, send_cost);
            }
        }
        self.greet(world, &identity, &traveler, &policy, &plan, tier, departure.as_ref(), &arrival);
        world.play_arrival_effects(&location);
        if let Some(departure) = departure.as_ref() {
            self.strike(world, departure, BlockRole::SendLightning);
        }
        self.strike(world, &arrival, BlockRole::ReceiveLightning);

        if let Some(mut reservation) = self.reservations.retire(id) {
            let _ = reservation.advance(ReservationState::Arrived, "arrive");
        }
        let name = traveler.display_name();
        info!("{} crossed from {:?} to {}", name, departure, arrival);
        self.incoming_events.push_arrival(Arrival {
            reservation: id,
            traveler: name.clone(),
            from: departure.clone(),
            to: arrival.clone(),
            location,
        });
        self.incoming_events.push_departure(Departure {
            reservation: id,
            traveler: name,
            from: departure.clone(),
            to: arrival,
        });
        if let Some(departure) = departure {
            self.advance_after_send(world, &departure);
        }
        Ok(())
    }

    /// Hands the traveler to the peer hosting the destination and arms the
    /// arrival window.
    fn send_outbound(&mut self, world: &mut dyn ZoneWorld, id: u64, peer: &str) -> Result<(), ReservationError> {
        if !self.is_peer_connected(peer) {
            return Err(self.fail_reservation(world, id, ReservationError::ServerOffline {
                server: peer.to_string(),
            }));
        }
        if self.reservations.outbound_count(peer) > self.config.reservation.max_pending_per_peer {
            return Err(self.fail_reservation(world, id, ReservationError::TooManyPending {
                server: peer.to_string(),
            }));
        }
        let Some(reservation) = self.reservations.get(id) else {
            return Err(ReservationError::TravelerGone);
        };
        let payload = ReservationPayload {
            id,
            traveler: reservation.traveler.clone(),
            from: reservation.departure.clone(),
            from_direction: reservation.departure_direction,
            to: reservation
                .arrival
                .as_ref()
                .map(|arrival| EndpointKey::local(arrival.zone(), arrival.name())),
            to_location: None,
        };
        let departure = reservation.departure.clone();
        if let Err(error) = self.send_to(peer, &PeerMessage::Reservation(payload)) {
            debug!("reservation {} could not be sent: {}", id, error);
            return Err(self.fail_reservation(world, id, ReservationError::ServerOffline {
                server: peer.to_string(),
            }));
        }

        let now = self.clock.now();
        let expires_at = now.add(self.config.reservation.arrival_window);
        let mut surrogate = None;
        if let Some(reservation) = self.reservations.get(id) {
            if !reservation.traveler.is_player() {
                if let Some(TravelerIdentity::Entity(original)) = reservation.identity.clone() {
                    surrogate = world.spawn_surrogate(&reservation.traveler);
                    world.remove_entity(original);
                }
            }
        }
        if let Some(reservation) = self.reservations.get_mut(id) {
            let _ = reservation.advance(ReservationState::Sent, "reservation");
            reservation.surrogate = surrogate;
            reservation.expires_at = Some(expires_at);
        }
        self.schedule(expires_at, Task::ReservationExpiry(id));
        if let Some(departure) = departure.as_ref() {
            self.strike(world, departure, BlockRole::SendLightning);
        }
        info!("reservation {} sent to {}", id, peer);
        Ok(())
    }

    pub(super) fn reservation_approved(&mut self, world: &mut dyn ZoneWorld, peer: &str, id: u64) {
        let Some(reservation) = self.outbound_mut(peer, id, "reservationApproved") else {
            return;
        };
        if let Err(error) = reservation.advance(ReservationState::Approved, "reservationApproved") {
            self.protocol_error(peer, error);
            return;
        }
        let player = reservation.traveler.player_name().map(str::to_string);
        let Some(player) = player else {
            // non-players complete with an arrival message
            return;
        };
        let address = self
            .peers
            .get(peer)
            .and_then(|session| session.public_address())
            .map(str::to_string);
        if !world.transfer_player(&player, peer, address.as_deref()) {
            warn!("could not hand {} over to {}", player, peer);
            self.queue_timeout(peer, id, true);
            self.fail_reservation(world, id, ReservationError::TravelerGone);
            return;
        }
        let expires_at = self.clock.now().add(self.config.reservation.arrival_timeout);
        if let Some(reservation) = self.reservations.get_mut(id) {
            reservation.expires_at = Some(expires_at);
        }
        self.schedule(expires_at, Task::ReservationExpiry(id));
    }

    pub(super) fn reservation_arrived(&mut self, world: &mut dyn ZoneWorld, peer: &str, id: u64) {
        if self.outbound_mut(peer, id, "reservationArrived").is_none() {
            return;
        }
        let Some(mut reservation) = self.reservations.retire(id) else {
            return;
        };
        if let Err(error) = reservation.advance(ReservationState::Arrived, "reservationArrived") {
            self.protocol_error(peer, error);
            return;
        }
        if let Some(player) = reservation.traveler.player_name() {
            if reservation.send_cost > 0.0 && !self.economy.debit(player, reservation.send_cost) {
                warn!("{} arrived but could not be charged {}", player, reservation.send_cost);
            }
        }
        let delete_inventory = reservation
            .departure
            .as_ref()
            .and_then(|key| self.registry.local(key))
            .is_some_and(|endpoint| endpoint.policy.delete_inventory);
        if let (true, Some(identity)) = (delete_inventory, reservation.identity.as_ref()) {
            world.clear_inventory(identity);
        }
        if let Some(surrogate) = reservation.surrogate {
            world.remove_entity(surrogate);
        }
        let Some(to) = reservation.arrival.clone() else {
            return;
        };
        info!("reservation {} landed on {}", id, peer);
        self.incoming_events.push_departure(Departure {
            reservation: id,
            traveler: reservation.traveler.display_name(),
            from: reservation.departure.clone(),
            to,
        });
        if let Some(departure) = reservation.departure.as_ref() {
            self.advance_after_send(world, departure);
        }
    }

    pub(super) fn reservation_denied(&mut self, world: &mut dyn ZoneWorld, peer: &str, id: u64, reason: String) {
        if self.outbound_mut(peer, id, "reservationDenied").is_none() {
            return;
        }
        self.fail_reservation(world, id, ReservationError::Denied { reason });
    }

    /// `id` is the sender's id when `from_sender` is set, otherwise ours.
    pub(super) fn reservation_timeout(&mut self, world: &mut dyn ZoneWorld, peer: &str, id: u64, from_sender: bool) {
        if !from_sender {
            if self.outbound_mut(peer, id, "reservationTimeout").is_some() {
                self.fail_reservation(world, id, ReservationError::TimedOut);
            }
            return;
        }
        let Some(local_id) = self.reservations.by_remote(peer, id) else {
            if !self.reservations.was_retired_remote(peer, id) {
                self.unknown_reservation(peer, id, "reservationTimeout");
            }
            return;
        };
        if let Some(mut reservation) = self.reservations.retire(local_id) {
            let _ = reservation.advance(ReservationState::Denied, "reservationTimeout");
            if let Some(name) = reservation.traveler.player_name() {
                self.expected_players.remove(name);
            }
            debug!("{} withdrew reservation {}", peer, id);
        }
    }

    /// Fires once the sender's wait for the destination is over.
    pub(super) fn reservation_expired(&mut self, world: &mut dyn ZoneWorld, id: u64) {
        let now = self.clock.now();
        let Some(reservation) = self.reservations.get(id) else {
            return;
        };
        if reservation.expires_at.is_some_and(|expires_at| expires_at > now) {
            return;
        }
        let Some(peer) = reservation.peer().map(str::to_string) else {
            return;
        };
        info!("reservation {} to {} timed out", id, peer);
        self.queue_timeout(&peer, id, true);
        self.fail_reservation(world, id, ReservationError::TimedOut);
    }

    // Receiving side

    pub(super) fn receive_reservation(&mut self, world: &mut dyn ZoneWorld, peer: &str, payload: ReservationPayload) {
        let remote_id = payload.id;
        if self.reservations.by_remote(peer, remote_id).is_some()
            || self.reservations.was_retired_remote(peer, remote_id)
        {
            debug!("ignoring duplicate reservation {} from {}", remote_id, peer);
            return;
        }
        if self.reservations.inbound_count(peer) >= self.config.reservation.max_pending_per_peer {
            let reason = ReservationError::TooManyPending {
                server: self.config.name.clone(),
            };
            self.queue_denial(peer, remote_id, &reason);
            return;
        }
        let arrival = payload.to.as_ref().map(|to| self.localize(to));
        let Some(arrival) = arrival.filter(|arrival| self.registry.local(arrival).is_some()) else {
            self.queue_denial(peer, remote_id, &ReservationError::NoDestination);
            return;
        };

        let now = self.clock.now();
        let id = self.reservations.next_id();
        let identity = payload
            .traveler
            .player_name()
            .map(|name| TravelerIdentity::Player(name.to_string()));
        let side = ReservationSide::Inbound {
            peer: peer.to_string(),
            remote_id,
        };
        let mut reservation = Reservation::new(id, side, identity, payload.traveler, now);
        reservation.departure = payload.from.map(|from| from.qualified(peer));
        reservation.departure_direction = payload.from_direction;
        reservation.arrival = Some(arrival.clone());
        self.reservations.insert(reservation);

        let Some(reservation) = self.reservations.get(id) else {
            return;
        };
        let traveler = reservation.traveler.clone();
        let departure_direction = reservation.departure_direction;
        let Some(endpoint) = self.registry.local(&arrival) else {
            return;
        };
        let plan = match check_arrival(
            &traveler,
            endpoint,
            RouteTier::Server,
            true,
            self.permissions.as_ref(),
            self.economy.as_ref(),
        ) {
            Ok(plan) => plan,
            Err(reason) => {
                self.refuse_inbound(peer, id, remote_id, &reason);
                return;
            }
        };
        let Some(landing) = resolve_landing(endpoint, world, self.config.gate.spawn_search_budget, &mut self.rng) else {
            self.refuse_inbound(peer, id, remote_id, &ReservationError::NoLanding);
            return;
        };
        let (location, velocity) = landing_point(world, &traveler, departure_direction, landing.location, landing.facing);
        if let Some(reservation) = self.reservations.get_mut(id) {
            let _ = reservation.advance(ReservationState::ArrivalChecked, "reservation");
            reservation.plan = Some(plan);
            reservation.destination = Some(location);
            reservation.velocity = velocity;
        }
        if let Err(error) = self.send_to(peer, &PeerMessage::ReservationApproved { id: remote_id }) {
            warn!("could not approve reservation {} from {}: {}", remote_id, peer, error);
            self.reservations.retire(id);
            return;
        }

        match traveler.player_name() {
            Some(name) => {
                debug!("expecting {} from {}", name, peer);
                self.expected_players.insert(name.to_string(), id);
                let due = now.add(self.config.reservation.arrival_timeout);
                self.schedule(due, Task::ArrivalTimeout(id));
            }
            None => self.complete_inbound(world, id),
        }
    }

    /// Lands an inbound traveler: the approved player showed up, or a
    /// non-player can be spawned right away.
    fn complete_inbound(&mut self, world: &mut dyn ZoneWorld, id: u64) {
        let Some(reservation) = self.reservations.get(id) else {
            return;
        };
        let (Some(peer), Some(remote_id)) = (reservation.peer().map(str::to_string), reservation.remote_id()) else {
            return;
        };
        let (Some(arrival), Some(location), Some(plan)) = (
            reservation.arrival.clone(),
            reservation.destination.clone(),
            reservation.plan.clone(),
        ) else {
            warn!("reservation {} is missing its landing, dropping it", id);
            self.reservations.retire(id);
            return;
        };
        let traveler = reservation.traveler.clone();
        let velocity = reservation.velocity;
        let departure = reservation.departure.clone();

        let identity = match reservation.identity.clone() {
            Some(identity) => {
                if !world.relocate(&identity, &location, velocity) {
                    self.refuse_inbound(&peer, id, remote_id, &ReservationError::TravelerGone);
                    return;
                }
                identity
            }
            None => match world.spawn_entity(&traveler, &location, velocity) {
                Some(entity) => TravelerIdentity::Entity(entity),
                None => {
                    self.refuse_inbound(&peer, id, remote_id, &ReservationError::NoLanding);
                    return;
                }
            },
        };
        let Some(policy) = self.registry.local(&arrival).map(|endpoint| endpoint.policy.clone()) else {
            self.refuse_inbound(&peer, id, remote_id, &ReservationError::NoDestination);
            return;
        };
        apply_plan(world, &identity, &policy, &plan, &traveler, true);
        if let Some(player) = traveler.player_name() {
            if plan.receive_cost > 0.0 && !self.economy.debit(player, plan.receive_cost) {
                warn!("{} arrived but could not be charged {}", player, plan.receive_cost);
            }
        }
        self.greet(world, &identity, &traveler, &policy, &plan, RouteTier::Server, departure.as_ref(), &arrival);
        world.play_arrival_effects(&location);
        self.strike(world, &arrival, BlockRole::ReceiveLightning);

        if let Some(mut reservation) = self.reservations.retire(id) {
            let _ = reservation.advance(ReservationState::Arrived, "arrive");
        }
        if let Err(error) = self.send_to(&peer, &PeerMessage::ReservationArrived { id: remote_id }) {
            warn!("could not confirm arrival {} to {}: {}", remote_id, peer, error);
        }
        info!("{} arrived at {} from {}", traveler.display_name(), arrival, peer);
        self.incoming_events.push_arrival(Arrival {
            reservation: id,
            traveler: traveler.display_name(),
            from: departure,
            to: arrival,
            location,
        });
    }

    /// The approved player never showed up.
    pub(super) fn arrival_timed_out(&mut self, _world: &mut dyn ZoneWorld, id: u64) {
        let Some(mut reservation) = self.reservations.retire(id) else {
            return;
        };
        let _ = reservation.advance(ReservationState::ArrivalTimedOut, "arrivalTimeout");
        if let Some(name) = reservation.traveler.player_name() {
            self.expected_players.remove(name);
        }
        if let (Some(peer), Some(remote_id)) = (reservation.peer().map(str::to_string), reservation.remote_id()) {
            info!("{} never arrived from {}", reservation.traveler.display_name(), peer);
            self.queue_timeout(&peer, remote_id, false);
        }
    }

    // Crate-public

    /// Ends a crossing this process started without it landing. The traveler
    /// stays where it was and is told why.
    pub(crate) fn fail_reservation(
        &mut self,
        world: &mut dyn ZoneWorld,
        id: u64,
        reason: ReservationError,
    ) -> ReservationError {
        let Some(mut reservation) = self.reservations.retire(id) else {
            return reason;
        };
        let terminal = match reason {
            ReservationError::TimedOut => ReservationState::TimedOut,
            _ => ReservationState::Denied,
        };
        let _ = reservation.advance(terminal, "fail");
        if let Some(surrogate) = reservation.surrogate.take() {
            world.remove_entity(surrogate);
            let traveler = &reservation.traveler;
            if world.spawn_entity(traveler, &traveler.location, traveler.velocity).is_none() {
                warn!("could not restore {} after reservation {} failed", traveler.display_name(), id);
            }
        }
        if let Some(identity) = reservation.identity.as_ref() {
            world.send_message(identity, &reason.to_string());
        }
        info!("reservation {} for {} failed: {}", id, reservation.traveler.display_name(), reason);
        self.incoming_events.push_denial(Denial {
            reservation: id,
            traveler: reservation.traveler.display_name(),
            reason: reason.clone(),
        });
        reason
    }

    // Private

    /// An outbound reservation owned by `peer`, or None after reporting the
    /// id as unknown. Late messages for retired ids are ignored.
    fn outbound_mut(&mut self, peer: &str, id: u64, command: &'static str) -> Option<&mut Reservation> {
        let owned = self
            .reservations
            .get(id)
            .is_some_and(|reservation| reservation.is_outbound() && reservation.peer() == Some(peer));
        if !owned {
            if !self.reservations.was_retired(id) {
                self.unknown_reservation(peer, id, command);
            } else {
                debug!("late {} for retired reservation {}", command, id);
            }
            return None;
        }
        self.reservations.get_mut(id)
    }

    fn unknown_reservation(&mut self, peer: &str, id: u64, command: &'static str) {
        let error = ProtocolError::UnknownReservation {
            peer: peer.to_string(),
            id,
            command,
        };
        self.protocol_error(peer, error);
    }

    fn refuse_inbound(&mut self, peer: &str, id: u64, remote_id: u64, reason: &ReservationError) {
        if let Some(mut reservation) = self.reservations.retire(id) {
            let _ = reservation.advance(ReservationState::Denied, "deny");
            if let Some(name) = reservation.traveler.player_name() {
                self.expected_players.remove(name);
            }
        }
        info!("refused reservation {} from {}: {}", remote_id, peer, reason);
        self.queue_denial(peer, remote_id, reason);
    }

    fn queue_denial(&mut self, peer: &str, remote_id: u64, reason: &ReservationError) {
        let message = PeerMessage::ReservationDenied {
            id: remote_id,
            reason: reason.to_string(),
        };
        if let Err(error) = self.send_to(peer, &message) {
            debug!("could not deny reservation {} from {}: {}", remote_id, peer, error);
        }
    }

    fn queue_timeout(&mut self, peer: &str, id: u64, from_sender: bool) {
        if let Err(error) = self.send_to(peer, &PeerMessage::ReservationTimeout { id, from_sender }) {
            debug!("could not withdraw reservation {} at {}: {}", id, peer, error);
        }
    }

    /// Arrival message and filter notices.
    #[allow(clippy::too_many_arguments)]
    fn greet(
        &self,
        world: &mut dyn ZoneWorld,
        identity: &TravelerIdentity,
        traveler: &TravelerSnapshot,
        policy: &EndpointPolicy,
        plan: &ArrivalPlan,
        tier: RouteTier,
        departure: Option<&EndpointKey>,
        arrival: &EndpointKey,
    ) {
        let Some(player) = traveler.player_name() else {
            return;
        };
        for notice in plan.notices.iter() {
            world.send_message(identity, notice);
        }
        let Some(template) = policy.templates.arrival(tier) else {
            return;
        };
        let own = self.config.name.as_str();
        let tokens = MessageTokens {
            player: player.to_string(),
            to_gate: arrival.name().to_string(),
            to_world: arrival.zone().to_string(),
            to_server: arrival.server().unwrap_or(own).to_string(),
            from_gate: departure.map(|key| key.name().to_string()).unwrap_or_default(),
            from_world: departure.map(|key| key.zone().to_string()).unwrap_or_default(),
            from_server: departure
                .map(|key| key.server().unwrap_or(own).to_string())
                .unwrap_or_default(),
        };
        world.send_message(identity, &format_message(template, &tokens));
    }

    /// Lightning on a random block of `role`, when the gate asks for it.
    fn strike(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey, role: BlockRole) {
        let Some(gate) = self.registry.gate(key) else {
            return;
        };
        let wanted = match role {
            BlockRole::SendLightning => gate.options.send_lightning,
            BlockRole::ReceiveLightning => gate.options.receive_lightning,
            _ => false,
        };
        if !wanted {
            return;
        }
        if let Some(block) = gate.footprint.pick_random(role, &mut self.rng) {
            world.strike_lightning(key.zone(), block.coord);
        }
    }

    fn advance_after_send(&mut self, world: &mut dyn ZoneWorld, departure: &EndpointKey) {
        let wants_next = self
            .registry
            .gate(departure)
            .is_some_and(|gate| gate.options.send_next_link);
        if wants_next {
            if let Err(error) = self.next_link(world, departure) {
                debug!("{} could not advance after a send: {}", departure, error);
            }
        }
    }
}

/// Final location and velocity for a traveler landing at `location`.
fn landing_point(
    world: &dyn ZoneWorld,
    traveler: &TravelerSnapshot,
    departure: Option<Direction>,
    location: Location,
    facing: Direction,
) -> (Location, Vector) {
    let yaw = landing_yaw(traveler.location.yaw, departure, facing);
    let location = location.with_facing(yaw, traveler.location.pitch);
    let velocity = launch_velocity(traveler.velocity, departure, facing);
    let velocity = settle_velocity(world, &location, velocity);
    (location, velocity)
}

/// Applies what the arrival endpoint lets through. `full` is set when the
/// traveler arrived from another process and starts from a blank slate.
fn apply_plan(
    world: &mut dyn ZoneWorld,
    identity: &TravelerIdentity,
    policy: &EndpointPolicy,
    plan: &ArrivalPlan,
    traveler: &TravelerSnapshot,
    full: bool,
) {
    if policy.receive_inventory && (full || plan.items_changed) {
        world.apply_inventory(identity, &plan.inventory, &plan.armor);
    }
    if policy.receive_effects && (full || plan.effects_changed) {
        world.apply_effects(identity, &plan.effects);
    }
    let Some(stats) = traveler.stats.as_ref() else {
        return;
    };
    if policy.receive_game_mode {
        world.apply_game_mode(identity, stats.game_mode);
    }
    if policy.receive_xp {
        world.apply_experience(identity, stats.level, stats.experience);
    }
    if policy.receive_stats && full {
        world.apply_vitals(identity, stats);
    }
}
