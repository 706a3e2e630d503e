use log::{debug, info, warn};

use gatelink_shared::{BlockRole, EndpointKey};

use crate::{
    error::RecordError,
    record::EndpointRecord,
    server::gate_server::{GateServer, Task},
    world::ZoneWorld,
};

impl GateServer {
    /// Registers the persisted endpoints of a zone that just loaded. Bad
    /// records are skipped and reported; the rest load.
    pub fn load_zone(
        &mut self,
        world: &mut dyn ZoneWorld,
        zone: &str,
        records: Vec<EndpointRecord>,
    ) -> Vec<RecordError> {
        let now = self.clock.now();
        let mut errors = Vec::new();
        let mut loaded = Vec::new();

        for record in records {
            if record.zone() != zone {
                errors.push(RecordError::WrongZone {
                    name: record.name().to_string(),
                    found: record.zone().to_string(),
                    expected: zone.to_string(),
                });
                continue;
            }
            let name = record.name().to_string();
            let endpoint = match record.into_endpoint(now) {
                Ok(endpoint) => endpoint,
                Err(error) => {
                    errors.push(error);
                    continue;
                }
            };
            let key = endpoint.key().clone();
            if let Some(gate) = endpoint.gate() {
                if let Some((owner, coord)) = self.indices.conflict(&key, &gate.footprint) {
                    errors.push(RecordError::Refused {
                        name,
                        reason: format!("block {} already belongs to {}", coord, owner),
                    });
                    continue;
                }
            }
            if let Err(error) = self.registry.add_local(endpoint) {
                errors.push(RecordError::Refused {
                    name,
                    reason: error.to_string(),
                });
                continue;
            }
            if let Some(local) = self.registry.local_mut(&key) {
                local.clear_dirty();
            }
            if let Some(gate) = self.registry.gate(&key) {
                self.indices.register_structure(&gate.footprint);
                if gate.is_open() {
                    self.indices.register(BlockRole::Portal, &gate.footprint);
                }
            }
            loaded.push(key);
        }

        for key in loaded.iter() {
            let Some(gate) = self.registry.gate(key) else {
                continue;
            };
            // local sources only count while they are open towards this gate
            let stale: Vec<EndpointKey> = gate
                .incoming()
                .iter()
                .filter(|origin| origin.is_local())
                .filter(|origin| {
                    !self
                        .registry
                        .gate(origin)
                        .is_some_and(|source| source.is_open() && source.outgoing() == Some(key))
                })
                .cloned()
                .collect();
            if !stale.is_empty() {
                if let Some(gate) = self.registry.gate_mut(key) {
                    gate.release_incoming(|origin| stale.contains(origin));
                }
                debug!("{} dropped {} stale sources on load", key, stale.len());
                self.schedule(now, Task::GateAutoClose(key.clone()));
            }
            let Some(gate) = self.registry.gate(key) else {
                continue;
            };
            let duration = gate.options.duration;
            let reattach = gate.is_open().then(|| gate.outgoing().cloned()).flatten();
            if let Some(to) = reattach {
                if self.resolve(&to).is_some() {
                    self.attach(world, &to, key);
                }
            }
            if self.registry.gate(key).is_some_and(|gate| gate.is_open()) && duration > 0 {
                let due = self.auto_close_due(now, duration);
                self.schedule(due, Task::GateAutoClose(key.clone()));
            }
            self.update_screens(world, key);
        }
        for error in errors.iter() {
            warn!("skipping endpoint in {}: {}", zone, error);
        }
        info!("loaded {} endpoints in {}", loaded.len(), zone);
        self.announce_registry_events();
        errors
    }

    /// Drops every endpoint of a zone that is going away and returns their
    /// records for saving. Open gates stay open in the records, but their
    /// destinations are released; gates left without a source or a
    /// destination close on the next update.
    pub fn unload_zone(&mut self, zone: &str) -> Vec<EndpointRecord> {
        let keys: Vec<EndpointKey> = self.registry.local_keys_in_zone(zone);
        let mut records = Vec::with_capacity(keys.len());
        let mut departing = Vec::new();
        for key in keys {
            self.indices.unregister_all(&key);
            if let Some(local) = self.registry.local(&key) {
                records.push(EndpointRecord::from_endpoint(local));
                let outgoing = local
                    .gate()
                    .filter(|gate| gate.is_open())
                    .and_then(|gate| gate.outgoing())
                    .cloned();
                if let Some(to) = outgoing {
                    departing.push((key.clone(), to));
                }
            }
            self.registry.remove(&key);
        }

        for (from, to) in departing {
            let to = self.localize(&to);
            if let Some(server) = to.server().map(str::to_string) {
                self.detach_remote(&server, &to, &from);
            }
        }
        let mut affected = self.release_incoming(|origin| origin.is_local() && origin.zone() == zone);
        // gates elsewhere that led into the zone lost their destination
        affected.extend(
            self.registry
                .local_endpoints()
                .filter(|endpoint| {
                    endpoint
                        .gate()
                        .filter(|gate| gate.is_open())
                        .and_then(|gate| gate.outgoing())
                        .is_some_and(|outgoing| outgoing.is_local() && outgoing.zone() == zone)
                })
                .map(|endpoint| endpoint.key().clone()),
        );
        let now = self.clock.now();
        for key in affected {
            self.schedule(now, Task::GateAutoClose(key));
        }

        info!("unloaded {} endpoints in {}", records.len(), zone);
        self.announce_registry_events();
        records
    }

    /// Records of every local endpoint changed since the last call.
    pub fn take_dirty_records(&mut self) -> Vec<EndpointRecord> {
        let dirty: Vec<EndpointKey> = self
            .registry
            .local_endpoints()
            .filter(|endpoint| endpoint.is_dirty())
            .map(|endpoint| endpoint.key().clone())
            .collect();
        let mut records = Vec::with_capacity(dirty.len());
        for key in dirty {
            if let Some(local) = self.registry.local_mut(&key) {
                local.clear_dirty();
                records.push(EndpointRecord::from_endpoint(local));
            }
        }
        records
    }
}
