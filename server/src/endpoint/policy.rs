use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gatelink_shared::GameMode;

/// Matches any item or effect kind in a filter table.
pub const WILDCARD: &str = "*";

/// Replacement value that removes the item or effect outright.
pub const NOTHING: &str = "none";

/// What happens to one item or effect kind passing through an endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Keep,
    Replace(String),
    Reject,
}

/// Replace, allow and ban lists for item or status-effect kinds.
///
/// Each kind is first replaced, then the replacement is checked against the
/// allow and ban lists. An empty allow list allows everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTable {
    #[serde(default)]
    pub replace: BTreeMap<String, String>,
    #[serde(default)]
    pub allow: BTreeSet<String>,
    #[serde(default)]
    pub ban: BTreeSet<String>,
}

impl FilterTable {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.allow.is_empty() && self.ban.is_empty()
    }

    fn is_allowed(&self, kind: &str) -> bool {
        if self.ban.contains(kind) || self.ban.contains(WILDCARD) {
            return false;
        }
        self.allow.is_empty() || self.allow.contains(kind) || self.allow.contains(WILDCARD)
    }

    pub fn apply(&self, kind: &str) -> FilterOutcome {
        let replaced = self
            .replace
            .get(kind)
            .or_else(|| self.replace.get(WILDCARD))
            .map(String::as_str);
        match replaced {
            Some(NOTHING) => FilterOutcome::Reject,
            Some(to) if to != kind => {
                if self.is_allowed(to) {
                    FilterOutcome::Replace(to.to_string())
                } else {
                    FilterOutcome::Reject
                }
            }
            _ => {
                if self.is_allowed(kind) {
                    FilterOutcome::Keep
                } else {
                    FilterOutcome::Reject
                }
            }
        }
    }
}

/// How far a route travels, which selects the cost column that applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTier {
    /// Same zone on this process
    Local,
    /// Another zone on this process
    World,
    /// Another process
    Server,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTable {
    #[serde(default)]
    pub link_local: f64,
    #[serde(default)]
    pub link_world: f64,
    #[serde(default)]
    pub link_server: f64,
    #[serde(default)]
    pub send_local: f64,
    #[serde(default)]
    pub send_world: f64,
    #[serde(default)]
    pub send_server: f64,
    #[serde(default)]
    pub receive_local: f64,
    #[serde(default)]
    pub receive_world: f64,
    #[serde(default)]
    pub receive_server: f64,
}

impl CostTable {
    pub fn link(&self, tier: RouteTier) -> f64 {
        match tier {
            RouteTier::Local => self.link_local,
            RouteTier::World => self.link_world,
            RouteTier::Server => self.link_server,
        }
    }

    pub fn send(&self, tier: RouteTier) -> f64 {
        match tier {
            RouteTier::Local => self.send_local,
            RouteTier::World => self.send_world,
            RouteTier::Server => self.send_server,
        }
    }

    pub fn receive(&self, tier: RouteTier) -> f64 {
        match tier {
            RouteTier::Local => self.receive_local,
            RouteTier::World => self.receive_world,
            RouteTier::Server => self.receive_server,
        }
    }
}

/// Arrival message templates, one per route tier. Tokens: `%player%`,
/// `%toGate%`, `%toWorld%`, `%toServer%`, `%fromGate%`, `%fromWorld%`,
/// `%fromServer%`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplates {
    pub arrival_local: Option<String>,
    pub arrival_world: Option<String>,
    pub arrival_server: Option<String>,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            arrival_local: Some("Welcome to %toGate%, %player%".to_string()),
            arrival_world: Some("Welcome to %toGate% in %toWorld%, %player%".to_string()),
            arrival_server: Some(
                "Welcome to %toGate% on %toServer%, %player%".to_string(),
            ),
        }
    }
}

impl MessageTemplates {
    pub fn arrival(&self, tier: RouteTier) -> Option<&str> {
        match tier {
            RouteTier::Local => self.arrival_local.as_deref(),
            RouteTier::World => self.arrival_world.as_deref(),
            RouteTier::Server => self.arrival_server.as_deref(),
        }
    }
}

/// Traveler-facing policy shared by every kind of local endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointPolicy {
    pub pins: BTreeSet<String>,
    pub require_pin: bool,
    pub require_valid_pin: bool,
    pub items: FilterTable,
    pub require_allowed_items: bool,
    pub effects: FilterTable,
    pub require_allowed_effects: bool,
    pub costs: CostTable,
    pub templates: MessageTemplates,
    pub receive_inventory: bool,
    pub receive_game_mode: bool,
    pub allow_game_modes: BTreeSet<GameMode>,
    pub receive_xp: bool,
    pub receive_effects: bool,
    pub receive_stats: bool,
    /// Clears a traveler's inventory once a cross-process crossing lands
    pub delete_inventory: bool,
    pub hidden: bool,
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self {
            pins: BTreeSet::new(),
            require_pin: false,
            require_valid_pin: true,
            items: FilterTable::default(),
            require_allowed_items: false,
            effects: FilterTable::default(),
            require_allowed_effects: false,
            costs: CostTable::default(),
            templates: MessageTemplates::default(),
            receive_inventory: true,
            receive_game_mode: false,
            allow_game_modes: BTreeSet::new(),
            receive_xp: false,
            receive_effects: true,
            receive_stats: true,
            delete_inventory: false,
            hidden: false,
        }
    }
}

impl EndpointPolicy {
    pub fn accepts_game_mode(&self, mode: Option<GameMode>) -> bool {
        match mode {
            Some(mode) => self.allow_game_modes.is_empty() || self.allow_game_modes.contains(&mode),
            None => true,
        }
    }
}
