use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GameMode, Location, Vector};

/// Process-local handle of an entity in a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Player,
    Item,
    Minecart,
    Boat,
    Creature(String),
}

impl EntityKind {
    pub fn is_player(&self) -> bool {
        matches!(self, EntityKind::Player)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: String,
    pub amount: u32,
    #[serde(default)]
    pub damage: u16,
}

impl ItemStack {
    pub fn new(kind: impl Into<String>, amount: u32) -> Self {
        Self {
            kind: kind.into(),
            amount,
            damage: 0,
        }
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            amount: self.amount,
            damage: self.damage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: String,
    pub duration_ticks: u32,
    pub amplifier: u8,
}

impl StatusEffect {
    pub fn new(kind: impl Into<String>, duration_ticks: u32, amplifier: u8) -> Self {
        Self {
            kind: kind.into(),
            duration_ticks,
            amplifier,
        }
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            duration_ticks: self.duration_ticks,
            amplifier: self.amplifier,
        }
    }
}

/// Identity details present only when the traveler is a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub client_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub health: f64,
    pub food_level: u32,
    pub saturation: f32,
    pub exhaustion: f32,
    pub level: u32,
    pub experience: f32,
    pub game_mode: GameMode,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            health: 20.0,
            food_level: 20,
            saturation: 5.0,
            exhaustion: 0.0,
            level: 0,
            experience: 0.0,
            game_mode: GameMode::Survival,
        }
    }
}

/// Everything needed to recreate a traveler on the far side of a crossing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TravelerSnapshot {
    pub kind: EntityKind,
    pub location: Location,
    pub velocity: Vector,
    #[serde(default)]
    pub player: Option<PlayerIdentity>,
    #[serde(default)]
    pub stats: Option<PlayerStats>,
    #[serde(default)]
    pub inventory: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub armor: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub effects: Vec<StatusEffect>,
}

impl TravelerSnapshot {
    pub fn player(name: impl Into<String>, location: Location) -> Self {
        Self {
            kind: EntityKind::Player,
            location,
            velocity: Vector::ZERO,
            player: Some(PlayerIdentity {
                name: name.into(),
                pin: None,
                client_address: None,
            }),
            stats: Some(PlayerStats::default()),
            inventory: Vec::new(),
            armor: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn entity(kind: EntityKind, location: Location) -> Self {
        Self {
            kind,
            location,
            velocity: Vector::ZERO,
            player: None,
            stats: None,
            inventory: Vec::new(),
            armor: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn is_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player.as_ref().map(|player| player.name.as_str())
    }

    pub fn pin(&self) -> Option<&str> {
        self.player.as_ref().and_then(|player| player.pin.as_deref())
    }

    /// Name used in templated messages.
    pub fn display_name(&self) -> String {
        match &self.player {
            Some(player) => player.name.clone(),
            None => format!("{:?}", self.kind).to_lowercase(),
        }
    }

    pub fn game_mode(&self) -> Option<GameMode> {
        self.stats.as_ref().map(|stats| stats.game_mode)
    }
}

/// Key under which at most one reservation may be active.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TravelerIdentity {
    Player(String),
    Entity(EntityId),
}

impl fmt::Display for TravelerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelerIdentity::Player(name) => write!(f, "player {}", name),
            TravelerIdentity::Entity(id) => write!(f, "{}", id),
        }
    }
}
