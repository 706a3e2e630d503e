/// In-memory ZoneWorld for driving gate servers in tests.
///
/// Everything below y=64 is stone, everything else air unless set. Players
/// and entities are plain snapshots; every side effect the server asks for
/// is recorded so tests can assert on it.
use std::collections::{BTreeMap, HashMap};

use gatelink_server::{
    shared::{
        BlockClass, BlockCoord, BlockState, EntityId, GameMode, ItemStack, Location, PlayerStats,
        RemotePlayer, StatusEffect, TravelerIdentity, TravelerSnapshot, Vector,
    },
    ZoneWorld,
};

pub const GROUND: i32 = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct Transfer {
    pub player: String,
    pub server: String,
    pub address: Option<String>,
}

pub struct TestWorld {
    pub zones: Vec<String>,
    pub blocks: HashMap<(String, BlockCoord), BlockState>,
    pub screens: HashMap<(String, BlockCoord), Vec<String>>,
    pub players: BTreeMap<String, TravelerSnapshot>,
    pub entities: BTreeMap<EntityId, TravelerSnapshot>,
    pub surrogates: BTreeMap<EntityId, TravelerSnapshot>,
    pub messages: Vec<(TravelerIdentity, String)>,
    pub transfers: Vec<Transfer>,
    pub lightning: Vec<(String, BlockCoord)>,
    pub arrival_effects: Vec<Location>,
    pub zone_times: HashMap<String, i64>,
    next_entity: u64,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self {
            zones: vec!["world".to_string()],
            blocks: HashMap::new(),
            screens: HashMap::new(),
            players: BTreeMap::new(),
            entities: BTreeMap::new(),
            surrogates: BTreeMap::new(),
            messages: Vec::new(),
            transfers: Vec::new(),
            lightning: Vec::new(),
            arrival_effects: Vec::new(),
            zone_times: HashMap::new(),
            next_entity: 1,
        }
    }
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zones(zones: &[&str]) -> Self {
        Self {
            zones: zones.iter().map(|zone| zone.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn place(&mut self, zone: &str, coord: BlockCoord, state: BlockState) {
        self.blocks.insert((zone.to_string(), coord), state);
    }

    /// Puts a player into this process at `location`.
    pub fn join(&mut self, name: &str, location: Location) -> TravelerIdentity {
        self.players
            .insert(name.to_string(), TravelerSnapshot::player(name, location));
        TravelerIdentity::Player(name.to_string())
    }

    pub fn player(&self, name: &str) -> Option<&TravelerSnapshot> {
        self.players.get(name)
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut TravelerSnapshot> {
        self.players.get_mut(name)
    }

    pub fn add_entity(&mut self, snapshot: TravelerSnapshot) -> TravelerIdentity {
        let id = self.allocate();
        self.entities.insert(id, snapshot);
        TravelerIdentity::Entity(id)
    }

    pub fn messages_for(&self, identity: &TravelerIdentity) -> Vec<String> {
        self.messages
            .iter()
            .filter(|(target, _)| target == identity)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn traveler_mut(&mut self, traveler: &TravelerIdentity) -> Option<&mut TravelerSnapshot> {
        match traveler {
            TravelerIdentity::Player(name) => self.players.get_mut(name),
            TravelerIdentity::Entity(id) => self.entities.get_mut(id),
        }
    }
}

impl ZoneWorld for TestWorld {
    fn zones(&self) -> Vec<String> {
        self.zones.clone()
    }

    fn block(&self, zone: &str, coord: BlockCoord) -> BlockState {
        if let Some(state) = self.blocks.get(&(zone.to_string(), coord)) {
            return state.clone();
        }
        if coord.y < GROUND {
            BlockState::new("stone", BlockClass::Solid)
        } else {
            BlockState::air()
        }
    }

    fn set_block(&mut self, zone: &str, coord: BlockCoord, state: BlockState) {
        self.place(zone, coord, state);
    }

    fn set_screen(&mut self, zone: &str, coord: BlockCoord, lines: &[String]) {
        self.screens.insert((zone.to_string(), coord), lines.to_vec());
    }

    fn snapshot(&self, traveler: &TravelerIdentity) -> Option<TravelerSnapshot> {
        match traveler {
            TravelerIdentity::Player(name) => self.players.get(name).cloned(),
            TravelerIdentity::Entity(id) => self.entities.get(id).cloned(),
        }
    }

    fn relocate(&mut self, traveler: &TravelerIdentity, location: &Location, velocity: Vector) -> bool {
        let Some(snapshot) = self.traveler_mut(traveler) else {
            return false;
        };
        snapshot.location = location.clone();
        snapshot.velocity = velocity;
        true
    }

    fn apply_inventory(
        &mut self,
        traveler: &TravelerIdentity,
        inventory: &[Option<ItemStack>],
        armor: &[Option<ItemStack>],
    ) {
        if let Some(snapshot) = self.traveler_mut(traveler) {
            snapshot.inventory = inventory.to_vec();
            snapshot.armor = armor.to_vec();
        }
    }

    fn apply_effects(&mut self, traveler: &TravelerIdentity, effects: &[StatusEffect]) {
        if let Some(snapshot) = self.traveler_mut(traveler) {
            snapshot.effects = effects.to_vec();
        }
    }

    fn apply_game_mode(&mut self, traveler: &TravelerIdentity, mode: GameMode) {
        if let Some(stats) = self.traveler_mut(traveler).and_then(|snapshot| snapshot.stats.as_mut()) {
            stats.game_mode = mode;
        }
    }

    fn apply_experience(&mut self, traveler: &TravelerIdentity, level: u32, experience: f32) {
        if let Some(stats) = self.traveler_mut(traveler).and_then(|snapshot| snapshot.stats.as_mut()) {
            stats.level = level;
            stats.experience = experience;
        }
    }

    fn apply_vitals(&mut self, traveler: &TravelerIdentity, incoming: &PlayerStats) {
        if let Some(stats) = self.traveler_mut(traveler).and_then(|snapshot| snapshot.stats.as_mut()) {
            stats.health = incoming.health;
            stats.food_level = incoming.food_level;
            stats.saturation = incoming.saturation;
            stats.exhaustion = incoming.exhaustion;
        }
    }

    fn clear_inventory(&mut self, traveler: &TravelerIdentity) {
        if let Some(snapshot) = self.traveler_mut(traveler) {
            snapshot.inventory.clear();
            snapshot.armor.clear();
        }
    }

    fn spawn_entity(
        &mut self,
        snapshot: &TravelerSnapshot,
        location: &Location,
        velocity: Vector,
    ) -> Option<EntityId> {
        let id = self.allocate();
        let mut spawned = snapshot.clone();
        spawned.location = location.clone();
        spawned.velocity = velocity;
        self.entities.insert(id, spawned);
        Some(id)
    }

    fn spawn_surrogate(&mut self, snapshot: &TravelerSnapshot) -> Option<EntityId> {
        let id = self.allocate();
        self.surrogates.insert(id, snapshot.clone());
        Some(id)
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
        self.surrogates.remove(&entity);
    }

    fn is_player_online(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    fn transfer_player(&mut self, name: &str, server: &str, address: Option<&str>) -> bool {
        if self.players.remove(name).is_none() {
            return false;
        }
        self.transfers.push(Transfer {
            player: name.to_string(),
            server: server.to_string(),
            address: address.map(str::to_string),
        });
        true
    }

    fn send_message(&mut self, traveler: &TravelerIdentity, message: &str) {
        self.messages.push((traveler.clone(), message.to_string()));
    }

    fn play_arrival_effects(&mut self, location: &Location) {
        self.arrival_effects.push(location.clone());
    }

    fn strike_lightning(&mut self, zone: &str, coord: BlockCoord) {
        self.lightning.push((zone.to_string(), coord));
    }

    fn zone_time(&self, zone: &str) -> Option<i64> {
        if !self.zones.iter().any(|known| known == zone) {
            return None;
        }
        Some(self.zone_times.get(zone).copied().unwrap_or(0))
    }

    fn online_players(&self) -> Vec<RemotePlayer> {
        self.players
            .iter()
            .map(|(name, snapshot)| RemotePlayer {
                name: name.clone(),
                zone: snapshot.location.zone.clone(),
            })
            .collect()
    }
}
