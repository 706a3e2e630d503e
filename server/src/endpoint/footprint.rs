use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gatelink_shared::{BlockCoord, BlockRole, BlockState, Direction, EndpointKey, RoleSet, SpatialIndex};

/// One block of a built gate, in absolute zone coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateBlock {
    pub coord: BlockCoord,
    /// State of the block while the gate is closed
    pub built: BlockState,
    /// State the block switches to while the gate is open
    #[serde(default)]
    pub open: Option<BlockState>,
    pub roles: RoleSet,
    /// Facing given to travelers landing on this block
    #[serde(default)]
    pub facing: Option<Direction>,
}

/// The blocks of a gate, with one index per role.
#[derive(Clone, Debug)]
pub struct BlockFootprint {
    zone: String,
    blocks: Vec<GateBlock>,
    indices: BTreeMap<BlockRole, SpatialIndex<EndpointKey>>,
}

impl BlockFootprint {
    pub fn new(owner: &EndpointKey, blocks: Vec<GateBlock>) -> Self {
        let mut indices: BTreeMap<BlockRole, SpatialIndex<EndpointKey>> = BTreeMap::new();
        for block in blocks.iter() {
            for role in block.roles.iter() {
                indices
                    .entry(role)
                    .or_insert_with(|| SpatialIndex::with_buckets(64))
                    .put(owner.clone(), owner.zone(), block.coord);
            }
        }
        Self {
            zone: owner.zone().to_string(),
            blocks,
            indices,
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn blocks(&self) -> &[GateBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks_with(&self, role: BlockRole) -> impl Iterator<Item = &GateBlock> {
        self.blocks
            .iter()
            .filter(move |block| block.roles.contains(role))
    }

    pub fn block_at(&self, coord: BlockCoord) -> Option<&GateBlock> {
        self.blocks.iter().find(|block| block.coord == coord)
    }

    /// Index of this gate's blocks with `role`, if it has any.
    pub fn index(&self, role: BlockRole) -> Option<&SpatialIndex<EndpointKey>> {
        self.indices.get(&role)
    }

    pub fn has_role(&self, role: BlockRole) -> bool {
        self.indices.get(&role).is_some_and(|index| !index.is_empty())
    }

    pub fn pick_random(&self, role: BlockRole, rng: &mut fastrand::Rng) -> Option<&GateBlock> {
        let entry = self.indices.get(&role)?.pick_random(rng)?;
        self.block_at(entry.coord)
    }

    pub(crate) fn reassign(&mut self, old: &EndpointKey, new: &EndpointKey) {
        for index in self.indices.values_mut() {
            index.reassign(old, new);
        }
    }
}
