use std::collections::BTreeMap;

use gatelink_shared::{BlockCoord, BlockRole, EndpointKey, SpatialIndex};

use crate::endpoint::footprint::BlockFootprint;

/// One process-wide [`SpatialIndex`] per coordinate-indexed block role.
pub struct RoleIndices {
    indices: BTreeMap<BlockRole, SpatialIndex<EndpointKey>>,
}

impl RoleIndices {
    pub fn new(bucket_count: usize) -> Self {
        let indices = BlockRole::INDEXED
            .into_iter()
            .map(|role| (role, SpatialIndex::with_buckets(bucket_count)))
            .collect();
        Self { indices }
    }

    pub fn index(&self, role: BlockRole) -> Option<&SpatialIndex<EndpointKey>> {
        self.indices.get(&role)
    }

    pub fn lookup(&self, role: BlockRole, zone: &str, coord: BlockCoord) -> Option<&EndpointKey> {
        self.indices.get(&role)?.lookup(zone, coord)
    }

    /// First block of `footprint` already claimed by another owner in the
    /// build index.
    pub fn conflict(&self, owner: &EndpointKey, footprint: &BlockFootprint) -> Option<(EndpointKey, BlockCoord)> {
        let build = self.indices.get(&BlockRole::Build)?;
        footprint.blocks().iter().find_map(|block| {
            build
                .lookup(footprint.zone(), block.coord)
                .filter(|existing| *existing != owner)
                .map(|existing| (existing.clone(), block.coord))
        })
    }

    /// Adds the footprint's blocks with `role` to the matching index.
    pub fn register(&mut self, role: BlockRole, footprint: &BlockFootprint) {
        if let (Some(index), Some(blocks)) = (self.indices.get_mut(&role), footprint.index(role)) {
            index.merge(blocks);
        }
    }

    /// Registers every role a gate keeps indexed whether open or closed.
    pub fn register_structure(&mut self, footprint: &BlockFootprint) {
        for role in [
            BlockRole::Build,
            BlockRole::Screen,
            BlockRole::Trigger,
            BlockRole::Switch,
        ] {
            self.register(role, footprint);
        }
    }

    pub fn unregister(&mut self, role: BlockRole, owner: &EndpointKey) -> usize {
        match self.indices.get_mut(&role) {
            Some(index) => index.remove_all_for_owner(owner),
            None => 0,
        }
    }

    pub fn unregister_all(&mut self, owner: &EndpointKey) {
        for index in self.indices.values_mut() {
            index.remove_all_for_owner(owner);
        }
    }

    pub fn reassign(&mut self, old: &EndpointKey, new: &EndpointKey) {
        for index in self.indices.values_mut() {
            index.reassign(old, new);
        }
    }
}
