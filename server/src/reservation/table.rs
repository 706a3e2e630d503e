use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use gatelink_shared::{KeyGenerator, TravelerIdentity};

use crate::reservation::reservation::Reservation;

/// How many retired ids are remembered to recognise late duplicates.
const RETIRED_MEMORY: usize = 1024;

/// Bounded set remembering the most recent insertions.
struct RecentSet<K> {
    order: VecDeque<K>,
    members: HashSet<K>,
}

impl<K: Clone + Eq + std::hash::Hash> RecentSet<K> {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    fn insert(&mut self, key: K) {
        if !self.members.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        if self.order.len() > RETIRED_MEMORY {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }
}

/// Every reservation not yet retired, indexed by local id, by traveler and
/// by the peer's id for inbound ones.
pub struct ReservationTable {
    ids: KeyGenerator,
    reservations: HashMap<u64, Reservation>,
    by_identity: HashMap<TravelerIdentity, u64>,
    by_remote: HashMap<(String, u64), u64>,
    retired: RecentSet<u64>,
    retired_remote: RecentSet<(String, u64)>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self {
            ids: KeyGenerator::new(),
            reservations: HashMap::new(),
            by_identity: HashMap::new(),
            by_remote: HashMap::new(),
            retired: RecentSet::new(),
            retired_remote: RecentSet::new(),
        }
    }

    pub fn next_id(&mut self) -> u64 {
        self.ids.generate()
    }

    /// Adds a reservation. An active reservation for the same traveler is
    /// retired and handed back.
    pub fn insert(&mut self, reservation: Reservation) -> Option<Reservation> {
        let id = reservation.local_id();
        let displaced = reservation
            .identity
            .as_ref()
            .and_then(|identity| self.by_identity.get(identity).copied())
            .and_then(|old| self.retire(old));
        if let Some(old) = displaced.as_ref() {
            debug!(
                "reservation {} replaces {} for {:?}",
                id,
                old.local_id(),
                old.identity
            );
        }
        if let Some(identity) = reservation.identity.clone() {
            self.by_identity.insert(identity, id);
        }
        if let (Some(peer), Some(remote_id)) = (reservation.peer(), reservation.remote_id()) {
            self.by_remote.insert((peer.to_string(), remote_id), id);
        }
        self.reservations.insert(id, reservation);
        displaced
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Reservation> {
        self.reservations.get_mut(&id)
    }

    pub fn for_identity(&self, identity: &TravelerIdentity) -> Option<&Reservation> {
        let id = self.by_identity.get(identity)?;
        self.reservations.get(id)
    }

    /// Local id of the reservation `peer` knows as `remote_id`.
    pub fn by_remote(&self, peer: &str, remote_id: u64) -> Option<u64> {
        self.by_remote.get(&(peer.to_string(), remote_id)).copied()
    }

    pub fn was_retired(&self, id: u64) -> bool {
        self.retired.contains(&id)
    }

    pub fn was_retired_remote(&self, peer: &str, remote_id: u64) -> bool {
        self.retired_remote.contains(&(peer.to_string(), remote_id))
    }

    /// Removes a reservation. Retiring an id that is no longer pending does
    /// nothing and returns None.
    pub fn retire(&mut self, id: u64) -> Option<Reservation> {
        let reservation = self.reservations.remove(&id)?;
        if let Some(identity) = reservation.identity.as_ref() {
            if self.by_identity.get(identity) == Some(&id) {
                self.by_identity.remove(identity);
            }
        }
        if let (Some(peer), Some(remote_id)) = (reservation.peer(), reservation.remote_id()) {
            let key = (peer.to_string(), remote_id);
            self.by_remote.remove(&key);
            self.retired_remote.insert(key);
        }
        self.retired.insert(id);
        debug!("reservation {} retired in state {}", id, reservation.state());
        Some(reservation)
    }

    /// Pending reservations exchanged with `peer`, in either direction.
    pub fn ids_for_peer(&self, peer: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .reservations
            .values()
            .filter(|reservation| reservation.peer() == Some(peer))
            .map(Reservation::local_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn outbound_count(&self, peer: &str) -> usize {
        self.reservations
            .values()
            .filter(|reservation| reservation.is_outbound() && reservation.peer() == Some(peer))
            .count()
    }

    pub fn inbound_count(&self, peer: &str) -> usize {
        self.reservations
            .values()
            .filter(|reservation| reservation.is_inbound() && reservation.peer() == Some(peer))
            .count()
    }
}

impl Default for ReservationTable {
    fn default() -> Self {
        Self::new()
    }
}
