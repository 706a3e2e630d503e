use std::{
    fmt,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};

/// Name of a game dimension hosted by some process.
pub type ZoneName = String;

/// Integer block position inside a zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn up(&self) -> Self {
        Self::new(self.x, self.y + 1, self.z)
    }

    pub fn down(&self) -> Self {
        Self::new(self.x, self.y - 1, self.z)
    }

    /// Center of the block's floor, where an entity would stand.
    pub fn standing_point(&self) -> Vector {
        Vector::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }

    /// Rotates a design offset (authored facing south) to face `direction`.
    pub fn rotated(&self, direction: Direction) -> Self {
        match direction {
            Direction::South => *self,
            Direction::West => Self::new(-self.z, self.y, self.x),
            Direction::North => Self::new(-self.x, self.y, -self.z),
            Direction::East => Self::new(self.z, self.y, -self.x),
        }
    }
}

impl Add for BlockCoord {
    type Output = BlockCoord;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for BlockCoord {
    type Output = BlockCoord;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Floating point 3-vector used for positions and velocities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn normalized(&self) -> Vector {
        let length = self.length();
        if length == 0.0 {
            return Vector::ZERO;
        }
        Vector::new(self.x / length, self.y / length, self.z / length)
    }

    /// Rotates around the vertical axis, using the same yaw convention as
    /// [`Direction::yaw`].
    pub fn rotated_yaw(&self, degrees: f64) -> Vector {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        Vector::new(
            self.x * cos - self.z * sin,
            self.y,
            self.x * sin + self.z * cos,
        )
    }

    pub fn block(&self) -> BlockCoord {
        BlockCoord::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Self) -> Self::Output {
        Vector::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Position and facing of an entity inside a zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub zone: ZoneName,
    pub position: Vector,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(zone: impl Into<ZoneName>, position: Vector) -> Self {
        Self {
            zone: zone.into(),
            position,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_facing(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    pub fn block(&self) -> BlockCoord {
        self.position.block()
    }
}

/// Horizontal orientation of an endpoint. The facing points out of the
/// endpoint's front, which is the side arriving travelers leave through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    #[default]
    South,
    West,
}

impl Direction {
    pub fn yaw(&self) -> f64 {
        match self {
            Direction::South => 0.0,
            Direction::West => 90.0,
            Direction::North => 180.0,
            Direction::East => 270.0,
        }
    }

    /// Nearest cardinal direction for a free yaw angle.
    pub fn from_yaw(yaw: f64) -> Self {
        let normalized = yaw.rem_euclid(360.0);
        match ((normalized + 45.0) / 90.0).floor() as i32 % 4 {
            0 => Direction::South,
            1 => Direction::West,
            2 => Direction::North,
            _ => Direction::East,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// Coarse physical class of a block, as reported by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockClass {
    Air,
    Liquid,
    Rail,
    SignPost,
    Torch,
    Cobweb,
    /// Non-solid decoration that an entity should not be launched into.
    Fixture,
    Solid,
}

impl BlockClass {
    /// Blocks a traveler can keep moving into after landing.
    pub fn is_launch_safe(&self) -> bool {
        matches!(
            self,
            BlockClass::Air
                | BlockClass::Liquid
                | BlockClass::Rail
                | BlockClass::SignPost
                | BlockClass::Torch
                | BlockClass::Cobweb
        )
    }

    pub fn is_solid(&self) -> bool {
        matches!(self, BlockClass::Solid)
    }
}

/// Material and class of a single block.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub material: String,
    pub class: BlockClass,
}

impl BlockState {
    pub fn new(material: impl Into<String>, class: BlockClass) -> Self {
        Self {
            material: material.into(),
            class,
        }
    }

    pub fn air() -> Self {
        Self::new("air", BlockClass::Air)
    }

    pub fn solid(material: impl Into<String>) -> Self {
        Self::new(material, BlockClass::Solid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl std::str::FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            _ => Err(()),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        };
        f.write_str(name)
    }
}
