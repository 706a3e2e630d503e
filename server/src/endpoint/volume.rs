use serde::{Deserialize, Serialize};

use gatelink_shared::{BlockCoord, Direction};

/// Order in which the vertical walk probes for a landing spot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchAxis {
    #[default]
    DownUp,
    UpDown,
    Down,
    Up,
}

/// Occupancy rules a landing spot in a volume must satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpawnSearch {
    pub axis: SearchAxis,
    pub air: bool,
    pub solid: bool,
    pub liquid: bool,
    /// Allows landing with nothing solid underfoot
    pub float: bool,
}

impl Default for SpawnSearch {
    fn default() -> Self {
        Self {
            axis: SearchAxis::DownUp,
            air: true,
            solid: false,
            liquid: false,
            float: false,
        }
    }
}

/// Rectangular area endpoint with no portal.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    pub direction: Direction,
    min: BlockCoord,
    max: BlockCoord,
    pub spawn: SpawnSearch,
}

impl Volume {
    /// Any two opposite corners.
    pub fn new(corner_a: BlockCoord, corner_b: BlockCoord, direction: Direction) -> Self {
        Self {
            direction,
            min: BlockCoord::new(
                corner_a.x.min(corner_b.x),
                corner_a.y.min(corner_b.y),
                corner_a.z.min(corner_b.z),
            ),
            max: BlockCoord::new(
                corner_a.x.max(corner_b.x),
                corner_a.y.max(corner_b.y),
                corner_a.z.max(corner_b.z),
            ),
            spawn: SpawnSearch::default(),
        }
    }

    pub fn min(&self) -> BlockCoord {
        self.min
    }

    pub fn max(&self) -> BlockCoord {
        self.max
    }

    pub fn contains(&self, coord: BlockCoord) -> bool {
        (self.min.x..=self.max.x).contains(&coord.x)
            && (self.min.y..=self.max.y).contains(&coord.y)
            && (self.min.z..=self.max.z).contains(&coord.z)
    }
}
