use std::collections::{BTreeMap, HashMap, VecDeque};

use log::debug;

use gatelink_shared::EndpointKey;

use crate::{
    endpoint::{
        endpoint::{Endpoint, LocalEndpoint, RemoteEndpoint},
        gate::Gate,
    },
    error::GateError,
};

/// Graph-wide change announced to every other endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(EndpointKey),
    Renamed { old: EndpointKey, new: EndpointKey },
    /// Unloaded with its zone; links to it stay in place
    Removed(EndpointKey),
    /// Gone for good; links to it are dropped
    Destroyed(EndpointKey),
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.chars().any(char::is_whitespace)
}

/// Every endpoint known to this process, plus per-player selections.
///
/// Renames and destroys are queued as [`RegistryEvent`]s; `process_events`
/// applies the link fixups to every local gate and hands the events back so
/// the caller can tell peers.
pub struct EndpointRegistry {
    endpoints: BTreeMap<EndpointKey, Endpoint>,
    selected: HashMap<String, EndpointKey>,
    events: VecDeque<RegistryEvent>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            selected: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.endpoints.contains_key(key)
    }

    pub fn get(&self, key: &EndpointKey) -> Option<&Endpoint> {
        self.endpoints.get(key)
    }

    pub fn get_mut(&mut self, key: &EndpointKey) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(key)
    }

    pub fn local(&self, key: &EndpointKey) -> Option<&LocalEndpoint> {
        self.endpoints.get(key).and_then(Endpoint::as_local)
    }

    pub fn local_mut(&mut self, key: &EndpointKey) -> Option<&mut LocalEndpoint> {
        self.endpoints.get_mut(key).and_then(Endpoint::as_local_mut)
    }

    pub fn gate(&self, key: &EndpointKey) -> Option<&Gate> {
        self.endpoints.get(key).and_then(Endpoint::gate)
    }

    pub fn gate_mut(&mut self, key: &EndpointKey) -> Option<&mut Gate> {
        self.endpoints.get_mut(key).and_then(Endpoint::gate_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn local_endpoints(&self) -> impl Iterator<Item = &LocalEndpoint> {
        self.endpoints.values().filter_map(Endpoint::as_local)
    }

    pub fn local_gate_keys(&self) -> Vec<EndpointKey> {
        self.endpoints
            .values()
            .filter(|endpoint| endpoint.gate().is_some())
            .map(|endpoint| endpoint.key().clone())
            .collect()
    }

    pub fn local_keys_in_zone(&self, zone: &str) -> Vec<EndpointKey> {
        self.endpoints
            .keys()
            .filter(|key| key.is_local() && key.zone() == zone)
            .cloned()
            .collect()
    }

    pub fn remote_keys_on(&self, server: &str) -> Vec<EndpointKey> {
        self.endpoints
            .keys()
            .filter(|key| key.server() == Some(server))
            .cloned()
            .collect()
    }

    /// Resolves a user-supplied name: a full key, or a short name that is
    /// unique among local endpoints.
    pub fn find(&self, name: &str) -> Option<EndpointKey> {
        if let Ok(key) = name.parse::<EndpointKey>() {
            if self.endpoints.contains_key(&key) {
                return Some(key);
            }
        }
        let mut matches = self
            .endpoints
            .keys()
            .filter(|key| key.is_local() && key.name().eq_ignore_ascii_case(name));
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.clone())
    }

    pub fn add_local(&mut self, endpoint: LocalEndpoint) -> Result<(), GateError> {
        let key = endpoint.key().clone();
        if !is_valid_name(key.name()) {
            return Err(GateError::InvalidName {
                name: key.name().to_string(),
            });
        }
        if self.endpoints.contains_key(&key) {
            return Err(GateError::DuplicateEndpoint {
                name: key.to_string(),
            });
        }
        self.endpoints.insert(key.clone(), Endpoint::Local(endpoint));
        self.events.push_back(RegistryEvent::Added(key));
        Ok(())
    }

    /// Inserts or refreshes a peer's endpoint. Refreshes are not events.
    pub fn upsert_remote(&mut self, endpoint: RemoteEndpoint) {
        let key = endpoint.key().clone();
        let is_new = !self.endpoints.contains_key(&key);
        self.endpoints.insert(key.clone(), Endpoint::Remote(endpoint));
        if is_new {
            self.events.push_back(RegistryEvent::Added(key));
        }
    }

    /// Drops cached endpoints of a peer without touching links to them.
    pub fn clear_remote_server(&mut self, server: &str) -> Vec<EndpointKey> {
        let keys = self.remote_keys_on(server);
        for key in keys.iter() {
            self.endpoints.remove(key);
        }
        keys
    }

    pub fn rename(&mut self, old: &EndpointKey, new_name: &str) -> Result<EndpointKey, GateError> {
        if !is_valid_name(new_name) {
            return Err(GateError::InvalidName {
                name: new_name.to_string(),
            });
        }
        let new = old.renamed(new_name);
        if &new == old {
            return Ok(new);
        }
        if self.endpoints.contains_key(&new) {
            return Err(GateError::DuplicateEndpoint {
                name: new.to_string(),
            });
        }
        let Some(mut endpoint) = self.endpoints.remove(old) else {
            return Err(GateError::UnknownEndpoint {
                name: old.to_string(),
            });
        };
        match &mut endpoint {
            Endpoint::Local(local) => local.set_key(new.clone()),
            Endpoint::Remote(remote) => remote.set_key(new.clone()),
        }
        self.endpoints.insert(new.clone(), endpoint);
        self.events.push_back(RegistryEvent::Renamed {
            old: old.clone(),
            new: new.clone(),
        });
        Ok(new)
    }

    /// Applies a rename announced by a peer. Links are fixed up even when the
    /// endpoint was never cached.
    pub fn rename_remote(&mut self, old: &EndpointKey, new_name: &str) -> EndpointKey {
        let new = old.renamed(new_name);
        if let Some(Endpoint::Remote(mut remote)) = self.endpoints.remove(old) {
            remote.set_key(new.clone());
            self.endpoints.insert(new.clone(), Endpoint::Remote(remote));
        }
        self.events.push_back(RegistryEvent::Renamed {
            old: old.clone(),
            new: new.clone(),
        });
        new
    }

    /// Applies a destroy announced by a peer.
    pub fn destroy_remote(&mut self, key: &EndpointKey) {
        self.endpoints.remove(key);
        self.events.push_back(RegistryEvent::Destroyed(key.clone()));
    }

    /// Removes an endpoint whose zone went away.
    pub fn remove(&mut self, key: &EndpointKey) -> Option<Endpoint> {
        let endpoint = self.endpoints.remove(key)?;
        self.events.push_back(RegistryEvent::Removed(key.clone()));
        Some(endpoint)
    }

    pub fn destroy(&mut self, key: &EndpointKey) -> Option<Endpoint> {
        let endpoint = self.endpoints.remove(key)?;
        self.events.push_back(RegistryEvent::Destroyed(key.clone()));
        Some(endpoint)
    }

    pub fn select(&mut self, player: &str, key: EndpointKey) {
        self.selected.insert(player.to_string(), key);
    }

    pub fn selected(&self, player: &str) -> Option<&EndpointKey> {
        self.selected.get(player)
    }

    pub fn deselect(&mut self, player: &str) -> Option<EndpointKey> {
        self.selected.remove(player)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Applies queued renames and destroys to every local gate and to the
    /// player selections. Returns the drained events.
    pub fn process_events(&mut self) -> Vec<RegistryEvent> {
        let events: Vec<RegistryEvent> = self.events.drain(..).collect();
        for event in events.iter() {
            match event {
                RegistryEvent::Renamed { old, new } => {
                    for endpoint in self.endpoints.values_mut() {
                        let Some(local) = endpoint.as_local_mut() else {
                            continue;
                        };
                        let changed = local
                            .gate_mut()
                            .is_some_and(|gate| gate.rename_references(old, new));
                        if changed {
                            debug!("{} now refers to {} instead of {}", local.key(), new, old);
                            local.mark_dirty();
                        }
                    }
                    for selection in self.selected.values_mut() {
                        if selection == old {
                            *selection = new.clone();
                        }
                    }
                }
                RegistryEvent::Destroyed(key) => {
                    for endpoint in self.endpoints.values_mut() {
                        let Some(local) = endpoint.as_local_mut() else {
                            continue;
                        };
                        let changed = local
                            .gate_mut()
                            .is_some_and(|gate| gate.remove_references(key));
                        if changed {
                            debug!("{} dropped references to destroyed {}", local.key(), key);
                            local.mark_dirty();
                        }
                    }
                    self.selected.retain(|_, selection| selection != key);
                }
                RegistryEvent::Added(_) | RegistryEvent::Removed(_) => {}
            }
        }
        events
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
