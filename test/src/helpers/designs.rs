use gatelink_server::{
    shared::{BlockClass, BlockCoord, BlockRole, BlockState, EndpointKey},
    DesignBlock, GateDesign, GateError, GateServer,
};

use crate::test_world::{TestWorld, GROUND};

pub const DOORWAY: &str = "doorway";

pub fn frame() -> BlockState {
    BlockState::solid("obsidian")
}

pub fn portal() -> BlockState {
    BlockState::new("portal", BlockClass::Fixture)
}

/// 1x2 doorway in an obsidian frame. The left post toggles the gate, the
/// right post cycles links, the lintel shows the screen and draws lightning.
pub fn doorway() -> GateDesign {
    GateDesign::new(
        DOORWAY,
        vec![
            DesignBlock::new(BlockCoord::new(-1, 0, 0), frame(), &[BlockRole::Build, BlockRole::Trigger]),
            DesignBlock::new(BlockCoord::new(-1, 1, 0), frame(), &[BlockRole::Build]),
            DesignBlock::new(BlockCoord::new(1, 0, 0), frame(), &[BlockRole::Build, BlockRole::Switch]),
            DesignBlock::new(BlockCoord::new(1, 1, 0), frame(), &[BlockRole::Build]),
            DesignBlock::new(
                BlockCoord::new(0, 2, 0),
                frame(),
                &[
                    BlockRole::Build,
                    BlockRole::Screen,
                    BlockRole::SendLightning,
                    BlockRole::ReceiveLightning,
                ],
            ),
            DesignBlock::new(BlockCoord::new(0, 0, 0), BlockState::air(), &[BlockRole::Portal]).opening_to(portal()),
            DesignBlock::new(BlockCoord::new(0, 1, 0), BlockState::air(), &[BlockRole::Portal]).opening_to(portal()),
            DesignBlock::new(BlockCoord::new(0, 0, 1), BlockState::air(), &[BlockRole::Spawn]),
        ],
    )
}

/// Ground-level origin for the `n`th doorway in a zone, spaced apart.
pub fn origin(n: i32) -> BlockCoord {
    BlockCoord::new(n * 10, GROUND, 0)
}

/// Lays the doorway's solid blocks facing south at `origin`.
pub fn place_doorway(world: &mut TestWorld, zone: &str, origin: BlockCoord) {
    for block in doorway().blocks.iter().filter(|block| block.built.class.is_solid()) {
        world.place(zone, origin + block.offset, block.built.clone());
    }
}

/// Places and registers a doorway gate.
pub fn build_doorway(
    server: &mut GateServer,
    world: &mut TestWorld,
    zone: &str,
    name: &str,
    origin: BlockCoord,
) -> Result<EndpointKey, GateError> {
    server.register_design(doorway())?;
    place_doorway(world, zone, origin);
    server.build_gate(world, zone, name, DOORWAY, origin)
}

/// Where travelers land when arriving at a doorway built at `origin`.
pub fn spawn_block(origin: BlockCoord) -> BlockCoord {
    origin + BlockCoord::new(0, 0, 1)
}
