use gatelink_shared::{
    BlockCoord, BlockState, EntityId, GameMode, ItemStack, Location, PlayerStats, RemotePlayer,
    StatusEffect, TravelerIdentity, TravelerSnapshot, Vector,
};

/// The game world a `GateServer` lives in. Every call is made from the
/// server's update loop; implementations never call back into the server.
pub trait ZoneWorld {
    /// Names of the zones currently loaded.
    fn zones(&self) -> Vec<String>;

    fn block(&self, zone: &str, coord: BlockCoord) -> BlockState;

    fn set_block(&mut self, zone: &str, coord: BlockCoord, state: BlockState);

    /// Replaces the text shown by a screen block.
    fn set_screen(&mut self, zone: &str, coord: BlockCoord, lines: &[String]);

    fn snapshot(&self, traveler: &TravelerIdentity) -> Option<TravelerSnapshot>;

    /// Moves a traveler already present in this process. Returns false if
    /// the traveler could not be moved.
    fn relocate(&mut self, traveler: &TravelerIdentity, location: &Location, velocity: Vector)
        -> bool;

    fn apply_inventory(
        &mut self,
        traveler: &TravelerIdentity,
        inventory: &[Option<ItemStack>],
        armor: &[Option<ItemStack>],
    );

    fn apply_effects(&mut self, traveler: &TravelerIdentity, effects: &[StatusEffect]);

    fn apply_game_mode(&mut self, traveler: &TravelerIdentity, mode: GameMode);

    fn apply_experience(&mut self, traveler: &TravelerIdentity, level: u32, experience: f32);

    /// Health, hunger and saturation.
    fn apply_vitals(&mut self, traveler: &TravelerIdentity, stats: &PlayerStats);

    fn clear_inventory(&mut self, traveler: &TravelerIdentity);

    /// Creates a non-player entity from a snapshot that arrived from a peer.
    fn spawn_entity(
        &mut self,
        snapshot: &TravelerSnapshot,
        location: &Location,
        velocity: Vector,
    ) -> Option<EntityId>;

    /// Creates a stand-in at the traveler's origin that holds its place while
    /// the crossing is in flight.
    fn spawn_surrogate(&mut self, snapshot: &TravelerSnapshot) -> Option<EntityId>;

    fn remove_entity(&mut self, entity: EntityId);

    fn is_player_online(&self, name: &str) -> bool;

    /// Hands a player's client over to another server process.
    fn transfer_player(&mut self, name: &str, server: &str, address: Option<&str>) -> bool;

    fn send_message(&mut self, traveler: &TravelerIdentity, message: &str);

    fn play_arrival_effects(&mut self, location: &Location);

    fn strike_lightning(&mut self, zone: &str, coord: BlockCoord);

    /// In-game time of a zone, in ticks.
    fn zone_time(&self, zone: &str) -> Option<i64>;

    fn online_players(&self) -> Vec<RemotePlayer>;
}

/// Yes/no permission oracle. Nodes look like `gatelink.use.world.g1`.
pub trait Permissions {
    fn has(&self, player: &str, node: &str) -> bool;
}

/// Grants everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Permissions for AllowAll {
    fn has(&self, _player: &str, _node: &str) -> bool {
        true
    }
}

pub trait Economy {
    fn can_afford(&self, player: &str, amount: f64) -> bool;

    /// Takes `amount` from the player. Returns false if it could not.
    fn debit(&mut self, player: &str, amount: f64) -> bool;

    fn format(&self, amount: f64) -> String {
        format!("{:.2}", amount)
    }
}

/// Charges nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeEconomy;

impl Economy for FreeEconomy {
    fn can_afford(&self, _player: &str, _amount: f64) -> bool {
        true
    }

    fn debit(&mut self, _player: &str, _amount: f64) -> bool {
        true
    }
}

pub(crate) mod nodes {
    use gatelink_shared::EndpointKey;

    pub fn use_endpoint(endpoint: &EndpointKey) -> String {
        format!("gatelink.use.{}", endpoint)
    }

    pub fn route(from: &EndpointKey, to: &EndpointKey) -> String {
        format!("gatelink.route.{}.{}", from, to)
    }

    pub fn receive(endpoint: &EndpointKey) -> String {
        format!("gatelink.receive.{}", endpoint)
    }
}
