use serde::{Deserialize, Serialize};

use gatelink_shared::{BlockCoord, BlockRole, BlockState, Direction, EndpointKey, RoleSet};

use crate::{
    endpoint::{
        footprint::{BlockFootprint, GateBlock},
        gate::GateOptions,
    },
    error::GateError,
    world::ZoneWorld,
};

/// One block of a design, relative to the design origin, authored facing
/// south.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignBlock {
    pub offset: BlockCoord,
    pub built: BlockState,
    #[serde(default)]
    pub open: Option<BlockState>,
    pub roles: RoleSet,
    #[serde(default)]
    pub facing: Option<Direction>,
}

impl DesignBlock {
    pub fn new(offset: BlockCoord, built: BlockState, roles: &[BlockRole]) -> Self {
        Self {
            offset,
            built,
            open: None,
            roles: RoleSet::of(roles),
            facing: None,
        }
    }

    pub fn opening_to(mut self, open: BlockState) -> Self {
        self.open = Some(open);
        self
    }

    pub fn facing(mut self, facing: Direction) -> Self {
        self.facing = Some(facing);
        self
    }
}

/// Block pattern that can be recognised in a zone and turned into a gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDesign {
    pub name: String,
    pub blocks: Vec<DesignBlock>,
    /// Options new gates of this design start with
    #[serde(default)]
    pub options: GateOptions,
}

fn rotate_facing(facing: Direction, direction: Direction) -> Direction {
    Direction::from_yaw(facing.yaw() + direction.yaw())
}

impl GateDesign {
    pub fn new(name: impl Into<String>, blocks: Vec<DesignBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
            options: GateOptions::default(),
        }
    }

    /// A usable design has blocks to recognise, something to walk through
    /// and somewhere to land.
    pub fn validate(&self) -> Result<(), GateError> {
        let has = |role| self.blocks.iter().any(|block| block.roles.contains(role));
        if self.blocks.is_empty() || !has(BlockRole::Portal) || !has(BlockRole::Spawn) {
            return Err(GateError::DesignMismatch {
                design: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether every block of the design is present at `origin` when built
    /// facing `direction`. Air blocks only have to be non-solid.
    pub fn matches(
        &self,
        world: &dyn ZoneWorld,
        zone: &str,
        origin: BlockCoord,
        direction: Direction,
    ) -> bool {
        self.blocks.iter().all(|block| {
            let found = world.block(zone, origin + block.offset.rotated(direction));
            if block.built.class.is_solid() {
                found.material == block.built.material
            } else {
                !found.class.is_solid()
            }
        })
    }

    /// Finds the direction the design is built facing at `origin`, if any.
    pub fn detect(&self, world: &dyn ZoneWorld, zone: &str, origin: BlockCoord) -> Option<Direction> {
        [
            Direction::South,
            Direction::West,
            Direction::North,
            Direction::East,
        ]
        .into_iter()
        .find(|direction| self.matches(world, zone, origin, *direction))
    }

    /// Absolute footprint of the design built at `origin` facing `direction`.
    pub fn footprint(
        &self,
        owner: &EndpointKey,
        origin: BlockCoord,
        direction: Direction,
    ) -> BlockFootprint {
        let blocks = self
            .blocks
            .iter()
            .map(|block| GateBlock {
                coord: origin + block.offset.rotated(direction),
                built: block.built.clone(),
                open: block.open.clone(),
                roles: block.roles,
                facing: Some(rotate_facing(block.facing.unwrap_or(Direction::South), direction)),
            })
            .collect();
        BlockFootprint::new(owner, blocks)
    }
}
