use log::warn;

use gatelink_shared::{BlockClass, BlockCoord, BlockRole, Direction, Location, Vector};

use crate::{
    endpoint::{Gate, LocalEndpoint, LocalShape, SearchAxis, SpawnSearch, Volume},
    world::ZoneWorld,
};

/// Where and how a traveler lands.
#[derive(Clone, Debug, PartialEq)]
pub struct Landing {
    pub location: Location,
    pub facing: Direction,
}

/// Picks a landing spot for `endpoint`. None when a gate has no spawn blocks.
pub fn resolve_landing(
    endpoint: &LocalEndpoint,
    world: &dyn ZoneWorld,
    budget: usize,
    rng: &mut fastrand::Rng,
) -> Option<Landing> {
    let zone = endpoint.key().zone();
    let (coord, facing) = match &endpoint.shape {
        LocalShape::Gate(gate) => gate_spawn(gate, rng)?,
        LocalShape::Volume(volume) => (volume_spawn(volume, world, zone, budget, rng), volume.direction),
    };
    let location = Location::new(zone, coord.standing_point()).with_facing(facing.yaw() as f32, 0.0);
    Some(Landing { location, facing })
}

fn gate_spawn(gate: &Gate, rng: &mut fastrand::Rng) -> Option<(BlockCoord, Direction)> {
    let block = gate.footprint.pick_random(BlockRole::Spawn, rng)?;
    Some((block.coord, block.facing.unwrap_or(gate.direction)))
}

fn accepts(search: &SpawnSearch, class: BlockClass) -> bool {
    match class {
        BlockClass::Solid => search.solid,
        BlockClass::Liquid => search.liquid,
        _ => search.air,
    }
}

fn fits(search: &SpawnSearch, world: &dyn ZoneWorld, zone: &str, coord: BlockCoord) -> bool {
    accepts(search, world.block(zone, coord).class)
        && accepts(search, world.block(zone, coord.up()).class)
        && (search.float || world.block(zone, coord.down()).class.is_solid())
}

/// Heights probed from `start`, in the order the search axis visits them.
fn column(axis: SearchAxis, start: i32, min: i32, max: i32) -> Vec<i32> {
    let down = (min..=start).rev();
    let up = start..=max;
    match axis {
        SearchAxis::DownUp => down.chain(up.skip(1)).collect(),
        SearchAxis::UpDown => up.chain(down.skip(1)).collect(),
        SearchAxis::Down => down.collect(),
        SearchAxis::Up => up.collect(),
    }
}

/// Samples random columns inside the volume and walks each one until a
/// spot satisfies the occupancy rules. Falls back to the minimum corner once
/// `budget` probes are spent.
pub fn volume_spawn(
    volume: &Volume,
    world: &dyn ZoneWorld,
    zone: &str,
    budget: usize,
    rng: &mut fastrand::Rng,
) -> BlockCoord {
    let (min, max) = (volume.min(), volume.max());
    let mut attempts = 0;
    while attempts < budget {
        let start = BlockCoord::new(rng.i32(min.x..=max.x), rng.i32(min.y..=max.y), rng.i32(min.z..=max.z));
        for y in column(volume.spawn.axis, start.y, min.y, max.y) {
            if attempts >= budget {
                break;
            }
            attempts += 1;
            let candidate = BlockCoord::new(start.x, y, start.z);
            if fits(&volume.spawn, world, zone, candidate) {
                return candidate;
            }
        }
    }
    warn!(
        "No landing spot found in volume {} - {} after {} attempts, using its corner",
        min, max, budget
    );
    min
}

/// Turns the velocity a traveler entered with into the one it leaves with,
/// rotated by the difference between the two endpoints' facings.
pub fn launch_velocity(velocity: Vector, departure: Option<Direction>, arrival: Direction) -> Vector {
    match departure {
        Some(departure) => velocity.rotated_yaw(arrival.yaw() - departure.yaw() + 180.0),
        None => velocity,
    }
}

/// Yaw a traveler faces after landing.
pub fn landing_yaw(traveler_yaw: f32, departure: Option<Direction>, arrival: Direction) -> f32 {
    match departure {
        Some(departure) => {
            let delta = arrival.yaw() - departure.yaw() + 180.0;
            ((traveler_yaw as f64 + delta).rem_euclid(360.0)) as f32
        }
        None => arrival.yaw() as f32,
    }
}

/// Drops the velocity when it would push the traveler into a block it
/// could get stuck in.
pub fn settle_velocity(world: &dyn ZoneWorld, location: &Location, velocity: Vector) -> Vector {
    if velocity.is_zero() {
        return velocity;
    }
    let next = (location.position + velocity.normalized()).block();
    if world.block(&location.zone, next).class.is_launch_safe() {
        velocity
    } else {
        Vector::ZERO
    }
}
