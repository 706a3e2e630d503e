use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::BlockCoord;

pub const DEFAULT_BUCKETS: usize = 1024;

/// Purpose a block serves inside an endpoint's footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockRole {
    /// Part of the structure; protected from breaking while the gate exists.
    Build,
    /// Displays the gate's name and selected destination.
    Screen,
    /// Interacting opens or closes the gate.
    Trigger,
    /// Interacting advances the selected link.
    Switch,
    /// Entities touching these blocks while the gate is open are sent.
    Portal,
    /// Candidate landing blocks for arriving travelers.
    Spawn,
    SendLightning,
    ReceiveLightning,
}

impl BlockRole {
    pub const ALL: [BlockRole; 8] = [
        BlockRole::Build,
        BlockRole::Screen,
        BlockRole::Trigger,
        BlockRole::Switch,
        BlockRole::Portal,
        BlockRole::Spawn,
        BlockRole::SendLightning,
        BlockRole::ReceiveLightning,
    ];

    /// Roles that are looked up by coordinate across all endpoints.
    pub const INDEXED: [BlockRole; 5] = [
        BlockRole::Build,
        BlockRole::Screen,
        BlockRole::Trigger,
        BlockRole::Switch,
        BlockRole::Portal,
    ];

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for BlockRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockRole::Build => "build",
            BlockRole::Screen => "screen",
            BlockRole::Trigger => "trigger",
            BlockRole::Switch => "switch",
            BlockRole::Portal => "portal",
            BlockRole::Spawn => "spawn",
            BlockRole::SendLightning => "sendLightning",
            BlockRole::ReceiveLightning => "receiveLightning",
        };
        f.write_str(name)
    }
}

/// Compact set of [`BlockRole`]s, serialized as a list.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<BlockRole>", into = "Vec<BlockRole>")]
pub struct RoleSet(u8);

impl RoleSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn of(roles: &[BlockRole]) -> Self {
        let mut set = Self::empty();
        for role in roles {
            set.insert(*role);
        }
        set
    }

    pub fn insert(&mut self, role: BlockRole) {
        self.0 |= role.bit();
    }

    pub fn remove(&mut self, role: BlockRole) {
        self.0 &= !role.bit();
    }

    pub fn contains(&self, role: BlockRole) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockRole> + '_ {
        BlockRole::ALL.into_iter().filter(|role| self.contains(*role))
    }
}

impl From<Vec<BlockRole>> for RoleSet {
    fn from(roles: Vec<BlockRole>) -> Self {
        RoleSet::of(&roles)
    }
}

impl From<RoleSet> for Vec<BlockRole> {
    fn from(set: RoleSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry<O> {
    pub zone: String,
    pub coord: BlockCoord,
    pub owner: O,
}

/// Hash-bucketed map from `(zone, coordinate)` to the owner of that block.
///
/// The bucket hash collides often, so every lookup re-checks the full
/// coordinate and zone of each candidate in the bucket.
#[derive(Clone, Debug)]
pub struct SpatialIndex<O> {
    buckets: Vec<Vec<IndexEntry<O>>>,
    len: usize,
}

impl<O: Clone + PartialEq> SpatialIndex<O> {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    pub fn with_buckets(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: vec![Vec::new(); bucket_count],
            len: 0,
        }
    }

    fn bucket_of(&self, coord: &BlockCoord) -> usize {
        let product = (coord.x as i64)
            .wrapping_mul(coord.y as i64)
            .wrapping_mul(coord.z as i64);
        (product.unsigned_abs() % self.buckets.len() as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Registers `owner` at the coordinate, replacing any previous owner.
    pub fn put(&mut self, owner: O, zone: &str, coord: BlockCoord) {
        let bucket_index = self.bucket_of(&coord);
        let bucket = &mut self.buckets[bucket_index];
        if let Some(entry) = bucket
            .iter_mut()
            .find(|entry| entry.coord == coord && entry.zone == zone)
        {
            entry.owner = owner;
            return;
        }
        bucket.push(IndexEntry {
            zone: zone.to_string(),
            coord,
            owner,
        });
        self.len += 1;
    }

    pub fn remove(&mut self, zone: &str, coord: BlockCoord) -> Option<O> {
        let bucket_index = self.bucket_of(&coord);
        let bucket = &mut self.buckets[bucket_index];
        let position = bucket
            .iter()
            .position(|entry| entry.coord == coord && entry.zone == zone)?;
        self.len -= 1;
        Some(bucket.swap_remove(position).owner)
    }

    /// Removes every entry belonging to `owner`, returning how many went.
    pub fn remove_all_for_owner(&mut self, owner: &O) -> usize {
        let mut removed = 0;
        for bucket in self.buckets.iter_mut() {
            let before = bucket.len();
            bucket.retain(|entry| &entry.owner != owner);
            removed += before - bucket.len();
        }
        self.len -= removed;
        removed
    }

    pub fn lookup(&self, zone: &str, coord: BlockCoord) -> Option<&O> {
        self.buckets[self.bucket_of(&coord)]
            .iter()
            .find(|entry| entry.coord == coord && entry.zone == zone)
            .map(|entry| &entry.owner)
    }

    pub fn contains(&self, zone: &str, coord: BlockCoord) -> bool {
        self.lookup(zone, coord).is_some()
    }

    /// Uniform pick over all registered entries.
    pub fn pick_random(&self, rng: &mut fastrand::Rng) -> Option<&IndexEntry<O>> {
        if self.len == 0 {
            return None;
        }
        let mut target = rng.usize(..self.len);
        for bucket in self.buckets.iter() {
            if target < bucket.len() {
                return bucket.get(target);
            }
            target -= bucket.len();
        }
        None
    }

    /// Copies every entry of `other` into this index.
    pub fn merge(&mut self, other: &SpatialIndex<O>) {
        for entry in other.iter() {
            self.put(entry.owner.clone(), &entry.zone, entry.coord);
        }
    }

    /// Replaces every owner equal to `old` with `new`.
    pub fn reassign(&mut self, old: &O, new: &O) {
        for entry in self.buckets.iter_mut().flatten() {
            if &entry.owner == old {
                entry.owner = new.clone();
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry<O>> {
        self.buckets.iter().flatten()
    }

    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.len = 0;
    }
}

impl<O: Clone + PartialEq> Default for SpatialIndex<O> {
    fn default() -> Self {
        Self::new()
    }
}
