use std::time::Duration;

use log::{debug, info, warn};

use gatelink_shared::{BlockCoord, BlockRole, Direction, EndpointKey, Instant, PeerMessage};

use crate::{
    endpoint::{
        CloseContext, EndpointPolicy, Gate, LocalEndpoint, LocalShape, RegistryEvent, RouteTier,
        Volume,
    },
    error::GateError,
    server::gate_server::{Destination, GateServer, Task},
    world::ZoneWorld,
};

impl GateServer {
    // Building

    /// Recognises a registered design at `origin` and registers a new gate
    /// built from it.
    pub fn build_gate(
        &mut self,
        world: &mut dyn ZoneWorld,
        zone: &str,
        name: &str,
        design: &str,
        origin: BlockCoord,
    ) -> Result<EndpointKey, GateError> {
        let Some(design) = self.designs.get(design) else {
            return Err(GateError::DesignMismatch {
                design: design.to_string(),
            });
        };
        let Some(direction) = design.detect(world, zone, origin) else {
            return Err(GateError::DesignMismatch {
                design: design.name.clone(),
            });
        };
        let key = EndpointKey::local(zone, name);
        let footprint = design.footprint(&key, origin, direction);
        if let Some((owner, coord)) = self.indices.conflict(&key, &footprint) {
            return Err(GateError::FootprintConflict {
                owner,
                coord: coord.to_string(),
            });
        }
        let gate = Gate::new(direction, design.name.clone(), design.options.clone(), footprint);
        let endpoint = LocalEndpoint::new(key.clone(), EndpointPolicy::default(), LocalShape::Gate(gate));
        self.registry.add_local(endpoint)?;
        if let Some(gate) = self.registry.gate(&key) {
            self.indices.register_structure(&gate.footprint);
        }
        self.update_screens(world, &key);
        info!("built gate {} facing {} at {} in {}", key, direction, origin, zone);
        Ok(key)
    }

    /// Registers a volume endpoint spanning two opposite corners.
    pub fn create_volume(
        &mut self,
        zone: &str,
        name: &str,
        corner_a: BlockCoord,
        corner_b: BlockCoord,
        direction: Direction,
    ) -> Result<EndpointKey, GateError> {
        let key = EndpointKey::local(zone, name);
        let volume = Volume::new(corner_a, corner_b, direction);
        let endpoint = LocalEndpoint::new(key.clone(), EndpointPolicy::default(), LocalShape::Volume(volume));
        self.registry.add_local(endpoint)?;
        info!("created volume {}", key);
        Ok(key)
    }

    /// Removes a local endpoint for good. Every gate linking to it drops the
    /// link and peers are told.
    pub fn destroy_endpoint(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) -> Result<(), GateError> {
        let key = self.local_key(key)?;
        if self.registry.gate(&key).is_some_and(|gate| gate.is_open()) {
            self.close_portal(world, &key);
        }
        self.indices.unregister_all(&key);
        self.registry.destroy(&key);
        if self.announce_registry_events() {
            self.close_orphaned_gates(world);
        }
        info!("destroyed endpoint {}", key);
        Ok(())
    }

    pub fn rename_endpoint(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey, new_name: &str) -> Result<EndpointKey, GateError> {
        let old = self.local_key(key)?;
        let new = self.registry.rename(&old, new_name)?;
        self.indices.reassign(&old, &new);
        self.announce_registry_events();
        self.update_screens(world, &new);
        info!("renamed endpoint {} to {}", old, new);
        Ok(new)
    }

    /// Sets a named gate option or policy field.
    pub fn set_option(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey, name: &str, value: &str) -> Result<(), GateError> {
        let key = self.local_key(key)?;
        let Some(endpoint) = self.registry.local_mut(&key) else {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        };
        endpoint.set_option(name, value)?;
        self.check_auto_close(world, &key);
        Ok(())
    }

    pub fn option(&self, key: &EndpointKey, name: &str) -> Result<String, GateError> {
        let key = self.local_key(key)?;
        match self.registry.local(&key) {
            Some(endpoint) => endpoint.option(name),
            None => Err(GateError::UnknownEndpoint { name: key.to_string() }),
        }
    }

    /// Remembers the endpoint a player is working on.
    pub fn select_endpoint(&mut self, player: &str, key: &EndpointKey) -> Result<(), GateError> {
        let key = self.localize(key);
        if !self.registry.contains(&key) {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        }
        self.registry.select(player, key);
        Ok(())
    }

    pub fn selected_endpoint(&self, player: &str) -> Option<&EndpointKey> {
        self.registry.selected(player)
    }

    // Links

    /// Replaces the whole arrival and departure policy of an endpoint.
    pub fn set_policy(&mut self, key: &EndpointKey, policy: EndpointPolicy) -> Result<(), GateError> {
        let key = self.local_key(key)?;
        let Some(endpoint) = self.registry.local_mut(&key) else {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        };
        endpoint.policy = policy;
        endpoint.mark_dirty();
        Ok(())
    }

    /// Adds `to` to the gate's links. Returns false when it was already
    /// linked. When `player` is given the link cost is charged to them.
    pub fn add_link(
        &mut self,
        world: &mut dyn ZoneWorld,
        player: Option<&str>,
        key: &EndpointKey,
        to: &EndpointKey,
    ) -> Result<bool, GateError> {
        let key = self.local_gate_key(key)?;
        let to = self.localize(to);
        if to == key {
            return Err(GateError::LinkNotAllowed {
                reason: "a gate cannot link to itself",
            });
        }
        let tier = self.route_tier(Some(&key), &to);
        let Some(endpoint) = self.registry.local(&key) else {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        };
        let Some(gate) = endpoint.gate() else {
            return Err(GateError::NotAGate { name: key.to_string() });
        };
        if gate.has_link(&to) {
            return Ok(false);
        }
        let allowed = match tier {
            RouteTier::Local => gate.options.link_local,
            RouteTier::World => gate.options.link_world,
            RouteTier::Server => gate.options.link_server,
        };
        if !allowed {
            return Err(GateError::LinkNotAllowed {
                reason: "the gate does not accept links of this range",
            });
        }
        if !gate.options.multi_link && !gate.links().is_empty() {
            return Err(GateError::LinkNotAllowed {
                reason: "the gate only accepts a single link",
            });
        }
        let cost = endpoint.policy.costs.link(tier);
        if let Some(player) = player {
            if cost > 0.0 && !self.economy.debit(player, cost) {
                return Err(GateError::LinkNotAllowed {
                    reason: "the link cost could not be paid",
                });
            }
        }

        let Some(endpoint) = self.registry.local_mut(&key) else {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        };
        let Some(gate) = endpoint.gate_mut() else {
            return Err(GateError::NotAGate { name: key.to_string() });
        };
        gate.add_link(to.clone());
        let attach = gate.is_open() && gate.outgoing() == Some(&to);
        endpoint.mark_dirty();
        debug!("{} links to {}", key, to);
        if attach {
            self.attach(world, &to, &key);
        }
        self.update_screens(world, &key);
        Ok(true)
    }

    /// Removes `to` from the gate's links. Returns false when it was not
    /// linked.
    pub fn remove_link(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey, to: &EndpointKey) -> Result<bool, GateError> {
        let key = self.local_gate_key(key)?;
        let to = self.localize(to);
        let Some(endpoint) = self.registry.local_mut(&key) else {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        };
        let Some(gate) = endpoint.gate_mut() else {
            return Err(GateError::NotAGate { name: key.to_string() });
        };
        let was_selected = gate.outgoing() == Some(&to);
        if !gate.remove_link(&to) {
            return Ok(false);
        }
        let open = gate.is_open();
        endpoint.mark_dirty();
        debug!("{} no longer links to {}", key, to);
        if open && was_selected {
            self.detach(world, &to, &key);
        }
        self.update_screens(world, &key);
        self.check_auto_close(world, &key);
        Ok(true)
    }

    /// Asks the peer hosting `remote` to add or remove a link from it to our
    /// local endpoint `local`. The answer surfaces as a `LinkEditEvent`.
    pub fn request_remote_link(
        &mut self,
        player: Option<&str>,
        remote: &EndpointKey,
        local: &EndpointKey,
        add: bool,
    ) -> Result<(), GateError> {
        let local = self.local_key(local)?;
        let Some(server) = remote.server().map(str::to_string) else {
            return Err(GateError::UnknownEndpoint { name: remote.to_string() });
        };
        let from = EndpointKey::local(remote.zone(), remote.name());
        let to = local.qualified(&self.config.name);
        let player = player.map(str::to_string);
        let message = if add {
            PeerMessage::LinkAdd { player, from, to }
        } else {
            PeerMessage::LinkRemove { player, from, to }
        };
        if self.send_to(&server, &message).is_err() {
            return Err(GateError::UnknownDestination {
                destination: remote.clone(),
            });
        }
        Ok(())
    }

    // Open and close

    /// Opens the gate towards its selected destination.
    pub fn open_gate(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) -> Result<(), GateError> {
        let key = self.local_gate_key(key)?;
        let Some(gate) = self.registry.gate(&key) else {
            return Err(GateError::NotAGate { name: key.to_string() });
        };
        if gate.is_open() {
            return Ok(());
        }
        if gate.links().is_empty() {
            return Err(GateError::NoLinks);
        }
        let Some(outgoing) = gate.outgoing().cloned() else {
            return Err(GateError::NoLinkSelected);
        };
        if self.resolve(&outgoing).is_none() {
            return Err(GateError::UnknownDestination { destination: outgoing });
        }
        self.open_portal(world, &key);
        self.attach(world, &outgoing, &key);
        Ok(())
    }

    pub fn close_gate(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) -> Result<(), GateError> {
        let key = self.local_gate_key(key)?;
        if self.registry.gate(&key).is_some_and(|gate| gate.is_open()) {
            self.close_portal(world, &key);
        }
        Ok(())
    }

    /// Advances the selected link, moving the attachment along when open.
    pub fn next_link(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) -> Result<(), GateError> {
        let key = self.local_gate_key(key)?;
        let Some(gate) = self.registry.gate(&key) else {
            return Err(GateError::NotAGate { name: key.to_string() });
        };
        if gate.links().is_empty() {
            return Err(GateError::NoLinks);
        }
        if !gate.next_is_noop() {
            let open = gate.is_open();
            let previous = gate.outgoing().cloned();
            if let (true, Some(previous)) = (open, previous.as_ref()) {
                self.detach(world, previous, &key);
            }
            let rng = &mut self.rng;
            let next = self.registry.local_mut(&key).and_then(|endpoint| {
                endpoint.mark_dirty();
                endpoint.gate_mut().and_then(|gate| gate.select_next(rng).cloned())
            });
            if let (true, Some(next)) = (open, next.as_ref()) {
                self.attach(world, next, &key);
            }
            self.update_screens(world, &key);
        }
        let Some(outgoing) = self.registry.gate(&key).and_then(|gate| gate.outgoing().cloned()) else {
            return Err(GateError::NoLinkSelected);
        };
        if self.resolve(&outgoing).is_none() {
            return Err(GateError::UnknownDestination { destination: outgoing });
        }
        Ok(())
    }

    /// Handles a player using a block: trigger blocks toggle the gate, switch
    /// blocks advance its link. Returns false when no gate owns the block.
    pub fn interact(&mut self, world: &mut dyn ZoneWorld, zone: &str, coord: BlockCoord) -> Result<bool, GateError> {
        if let Some(key) = self.indices.lookup(BlockRole::Trigger, zone, coord).cloned() {
            let open = self.registry.gate(&key).is_some_and(|gate| gate.is_open());
            if open {
                self.close_gate(world, &key)?;
            } else {
                self.open_gate(world, &key)?;
            }
            return Ok(true);
        }
        if let Some(key) = self.indices.lookup(BlockRole::Switch, zone, coord).cloned() {
            self.next_link(world, &key)?;
            return Ok(true);
        }
        Ok(false)
    }

    // Crate-public

    /// Records `from` as attached to `to`. Remote destinations are told over
    /// their peer session.
    pub(crate) fn attach(&mut self, world: &mut dyn ZoneWorld, to: &EndpointKey, from: &EndpointKey) {
        let to = self.localize(to);
        if let Some(server) = to.server().map(str::to_string) {
            let message = PeerMessage::EndpointAttach {
                to: EndpointKey::local(to.zone(), to.name()),
                from: from.qualified(&self.config.name),
            };
            if let Err(error) = self.send_to(&server, &message) {
                debug!("could not attach {} to {}: {}", from, to, error);
            }
            return;
        }
        let Some(endpoint) = self.registry.local_mut(&to) else {
            debug!("attach to unknown endpoint {} ignored", to);
            return;
        };
        let Some(gate) = endpoint.gate_mut() else {
            return;
        };
        if !gate.attach_incoming(from.clone()) {
            return;
        }
        gate.ensure_outgoing();
        let was_open = gate.is_open();
        let onward = gate.outgoing().cloned();
        endpoint.mark_dirty();
        debug!("{} attached to {}", from, to);

        if !was_open {
            self.open_portal(world, &to);
        }
        if let Some(onward) = onward {
            if self.resolve(&onward).is_some() {
                self.attach(world, &onward, &to);
            }
        }
        self.update_screens(world, &to);
    }

    pub(crate) fn detach(&mut self, world: &mut dyn ZoneWorld, to: &EndpointKey, from: &EndpointKey) {
        let to = self.localize(to);
        if let Some(server) = to.server().map(str::to_string) {
            self.detach_remote(&server, &to, from);
            return;
        }
        let detached = self
            .registry
            .local_mut(&to)
            .and_then(|endpoint| {
                let detached = endpoint.gate_mut()?.detach_incoming(from);
                if detached {
                    endpoint.mark_dirty();
                }
                Some(detached)
            })
            .unwrap_or(false);
        if detached {
            debug!("{} detached from {}", from, to);
            self.check_auto_close(world, &to);
        }
    }

    /// Tells the peer hosting `to` that `from` no longer feeds it.
    pub(super) fn detach_remote(&mut self, server: &str, to: &EndpointKey, from: &EndpointKey) {
        let message = PeerMessage::EndpointDetach {
            to: EndpointKey::local(to.zone(), to.name()),
            from: from.qualified(&self.config.name),
        };
        if let Err(error) = self.send_to(server, &message) {
            debug!("could not detach {} from {}: {}", from, to, error);
        }
    }

    /// Drops attachments whose origin matches `stale` from every local gate.
    /// Returns the gates that lost one.
    pub(super) fn release_incoming(&mut self, mut stale: impl FnMut(&EndpointKey) -> bool) -> Vec<EndpointKey> {
        let mut released = Vec::new();
        for key in self.registry.local_gate_keys() {
            let Some(endpoint) = self.registry.local_mut(&key) else {
                continue;
            };
            let dropped = endpoint
                .gate_mut()
                .is_some_and(|gate| gate.release_incoming(&mut stale));
            if dropped {
                endpoint.mark_dirty();
                debug!("{} released stale attachments", key);
                released.push(key);
            }
        }
        released
    }

    /// Closes the gate if the auto-close policy allows it right now.
    pub(crate) fn check_auto_close(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) {
        let Some(gate) = self.registry.gate(key) else {
            return;
        };
        if !gate.is_open() {
            return;
        }
        let now = self.clock.now();
        let outgoing = gate.outgoing().cloned();
        let partner_mutual = match outgoing.as_ref().and_then(|outgoing| self.resolve(outgoing)) {
            Some(Destination::Local(partner)) => self.registry.gate(&partner).is_some_and(|partner| {
                partner.outgoing() == Some(key) && partner.incoming().len() == 1 && partner.incoming().contains(key)
            }),
            _ => false,
        };
        let context = CloseContext {
            now,
            grace: self.config.gate.auto_close_grace,
            outgoing_valid: outgoing.as_ref().is_some_and(|outgoing| self.resolve(outgoing).is_some()),
            partner_mutual,
        };
        if gate.can_close(&context) {
            info!("auto-closing {}", key);
            self.close_portal(world, key);
        } else if !gate.is_permanent() && !gate.is_expired(now, context.grace) {
            if let Some(opened_at) = gate.opened_at() {
                let due = self.auto_close_due(opened_at, gate.options.duration);
                self.schedule(due, Task::GateAutoClose(key.clone()));
            }
        }
    }

    /// Switches a gate to open: portal blocks indexed, open block states set.
    pub(crate) fn open_portal(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) {
        let now = self.clock.now();
        let Some(endpoint) = self.registry.local_mut(key) else {
            self.warn_integrity("open", key);
            return;
        };
        let Some(gate) = endpoint.gate_mut() else {
            return;
        };
        let openings: Vec<_> = gate
            .footprint
            .blocks()
            .iter()
            .filter_map(|block| block.open.clone().map(|state| (block.coord, state)))
            .collect();
        let zone = key.zone().to_string();
        for (coord, state) in openings {
            if gate.options.restore_on_close {
                gate.save_block(coord, world.block(&zone, coord));
            }
            world.set_block(&zone, coord, state);
        }
        gate.mark_open(now);
        let duration = gate.options.duration;
        endpoint.mark_dirty();
        if let Some(gate) = self.registry.gate(key) {
            self.indices.register(BlockRole::Portal, &gate.footprint);
        }
        if duration > 0 {
            let due = self.auto_close_due(now, duration);
            self.schedule(due, Task::GateAutoClose(key.clone()));
        }
        info!("opened {}", key);
        self.incoming_events.push_gate_opened(key);
    }

    /// Switches a gate to closed and detaches it from its destination.
    pub(crate) fn close_portal(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) {
        self.indices.unregister(BlockRole::Portal, key);
        let Some(endpoint) = self.registry.local_mut(key) else {
            self.warn_integrity("close", key);
            return;
        };
        let Some(gate) = endpoint.gate_mut() else {
            return;
        };
        let zone = key.zone().to_string();
        let saved = gate.mark_closed();
        if gate.options.restore_on_close && !saved.is_empty() {
            for (coord, state) in saved {
                world.set_block(&zone, coord, state);
            }
        } else {
            for block in gate.footprint.blocks().iter().filter(|block| block.open.is_some()) {
                world.set_block(&zone, block.coord, block.built.clone());
            }
        }
        let outgoing = gate.outgoing().cloned();
        endpoint.mark_dirty();
        info!("closed {}", key);
        self.incoming_events.push_gate_closed(key);
        if let Some(outgoing) = outgoing {
            self.detach(world, &outgoing, key);
        }
        self.update_screens(world, key);
    }

    /// Redraws every screen block of a gate.
    pub(crate) fn update_screens(&mut self, world: &mut dyn ZoneWorld, key: &EndpointKey) {
        let Some(gate) = self.registry.gate(key) else {
            return;
        };
        let destination = match gate.outgoing() {
            Some(outgoing) => outgoing.to_string(),
            None if gate.links().is_empty() => "<no links>".to_string(),
            None => "<none selected>".to_string(),
        };
        let lines = vec![key.name().to_string(), destination];
        for block in gate.footprint.blocks_with(BlockRole::Screen) {
            world.set_screen(key.zone(), block.coord, &lines);
        }
    }

    /// Applies queued registry events and tells peers about changes to our
    /// own endpoints. Returns true if any endpoint was destroyed.
    pub(crate) fn announce_registry_events(&mut self) -> bool {
        let mut destroyed = false;
        for event in self.registry.process_events() {
            destroyed |= matches!(event, RegistryEvent::Destroyed(_));
            let message = match event {
                RegistryEvent::Added(key) if key.is_local() => match self.registry.local(&key) {
                    Some(endpoint) => PeerMessage::EndpointAdded {
                        endpoint: endpoint.summary(),
                    },
                    None => continue,
                },
                RegistryEvent::Renamed { old, new } if old.is_local() => PeerMessage::EndpointRenamed {
                    old_key: old,
                    new_name: new.name().to_string(),
                },
                RegistryEvent::Removed(key) if key.is_local() => PeerMessage::EndpointRemoved { endpoint: key },
                RegistryEvent::Destroyed(key) if key.is_local() => {
                    PeerMessage::EndpointDestroyed { endpoint: key }
                }
                _ => continue,
            };
            self.broadcast(&message);
        }
        destroyed
    }

    /// Re-checks open gates left without a selected destination.
    pub(crate) fn close_orphaned_gates(&mut self, world: &mut dyn ZoneWorld) {
        let orphaned: Vec<EndpointKey> = self
            .registry
            .local_endpoints()
            .filter(|endpoint| {
                endpoint
                    .gate()
                    .is_some_and(|gate| gate.is_open() && gate.outgoing().is_none())
            })
            .map(|endpoint| endpoint.key().clone())
            .collect();
        for key in orphaned {
            self.check_auto_close(world, &key);
        }
    }

    // Private

    pub(super) fn auto_close_due(&self, opened_at: Instant, duration: i64) -> Instant {
        let duration = Duration::from_millis(duration.max(0) as u64);
        opened_at.add(duration.saturating_sub(self.config.gate.auto_close_grace))
    }

    /// `key` as a registered local endpoint.
    fn local_key(&self, key: &EndpointKey) -> Result<EndpointKey, GateError> {
        let key = self.localize(key);
        if self.registry.local(&key).is_none() {
            return Err(GateError::UnknownEndpoint { name: key.to_string() });
        }
        Ok(key)
    }

    fn local_gate_key(&self, key: &EndpointKey) -> Result<EndpointKey, GateError> {
        let key = self.local_key(key)?;
        if self.registry.gate(&key).is_none() {
            warn!("{} is not a gate", key);
            return Err(GateError::NotAGate { name: key.to_string() });
        }
        Ok(key)
    }
}
