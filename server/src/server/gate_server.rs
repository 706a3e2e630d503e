use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    mem,
};

use log::{debug, info, warn};

use gatelink_shared::{
    BlockRole, BlockCoord, Clock, EndpointKey, Instant, KeyGenerator, TimeQueue, TravelerIdentity,
};

use crate::{
    endpoint::{EndpointRegistry, Gate, GateDesign, LocalEndpoint, RoleIndices, RouteTier},
    error::GateError,
    events::GateEvents,
    peer::{PeerLink, PeerSession, PeerTransport},
    reservation::{Reservation, ReservationTable},
    server::ServerConfig,
    world::{AllowAll, Economy, FreeEconomy, Permissions, ZoneWorld},
};

/// Deferred work run from `update` once due.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    ReservationExpiry(u64),
    ArrivalTimeout(u64),
    GateAutoClose(EndpointKey),
    PeerReconnect(String),
    PeerKeepalive,
}

/// Where a link currently leads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Destination {
    Local(EndpointKey),
    Remote { server: String, key: EndpointKey },
}

/// Anonymous accepted link waiting for the peer to introduce itself.
pub(super) struct PendingLink {
    pub(super) link: Box<dyn PeerLink>,
    pub(super) accepted_at: Instant,
}

/// The gate service of one server process. Owns every endpoint, index,
/// reservation and peer session; all mutation goes through `&mut self`, and
/// deferred work runs from [`GateServer::update`].
pub struct GateServer {
    pub(super) config: ServerConfig,
    pub(super) clock: Box<dyn Clock>,
    pub(super) rng: fastrand::Rng,
    pub(super) registry: EndpointRegistry,
    pub(super) indices: RoleIndices,
    pub(super) designs: BTreeMap<String, GateDesign>,
    pub(super) reservations: ReservationTable,
    /// Approved inbound players we are waiting on, by name
    pub(super) expected_players: HashMap<String, u64>,
    pub(super) tasks: TimeQueue<Task>,
    pub(super) transport: Box<dyn PeerTransport>,
    pub(super) pending_links: Vec<PendingLink>,
    pub(super) peers: BTreeMap<String, PeerSession>,
    /// Peers whose connection was announced with a `PeerConnectEvent`
    pub(super) online: BTreeSet<String>,
    pub(super) api_requests: KeyGenerator,
    pub(super) permissions: Box<dyn Permissions>,
    pub(super) economy: Box<dyn Economy>,
    pub(super) incoming_events: GateEvents,
}

impl GateServer {
    /// Create a new GateServer
    pub fn new(config: ServerConfig, transport: Box<dyn PeerTransport>, clock: Box<dyn Clock>) -> Self {
        let now = clock.now();
        let mut tasks = TimeQueue::new();
        let mut peers = BTreeMap::new();
        for settings in config.peer.peers.iter() {
            let session = PeerSession::new(
                settings.clone(),
                config.peer.max_outbound_queue,
                config.peer.reconnect_min,
            );
            if session.dials() {
                tasks.add_item(now, Task::PeerReconnect(settings.name.clone()));
            }
            peers.insert(settings.name.clone(), session);
        }
        tasks.add_item(now.add(config.peer.keepalive_interval), Task::PeerKeepalive);
        info!("gate server '{}' starting with {} peers", config.name, peers.len());

        Self {
            indices: RoleIndices::new(config.gate.index_buckets),
            config,
            clock,
            rng: fastrand::Rng::new(),
            registry: EndpointRegistry::new(),
            designs: BTreeMap::new(),
            reservations: ReservationTable::new(),
            expected_players: HashMap::new(),
            tasks,
            transport,
            pending_links: Vec::new(),
            peers,
            online: BTreeSet::new(),
            api_requests: KeyGenerator::new(),
            permissions: Box::new(AllowAll),
            economy: Box::new(FreeEconomy),
            incoming_events: GateEvents::new(),
        }
    }

    pub fn set_permissions(&mut self, permissions: Box<dyn Permissions>) {
        self.permissions = permissions;
    }

    pub fn set_economy(&mut self, economy: Box<dyn Economy>) {
        self.economy = economy;
    }

    /// Seeds the random source used for link selection and landing spots.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = fastrand::Rng::with_seed(seed);
    }

    pub fn register_design(&mut self, design: GateDesign) -> Result<(), GateError> {
        design.validate()?;
        self.designs.insert(design.name.clone(), design);
        Ok(())
    }

    // Public accessors

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn endpoint(&self, key: &EndpointKey) -> Option<&LocalEndpoint> {
        self.registry.local(key)
    }

    pub fn gate(&self, key: &EndpointKey) -> Option<&Gate> {
        self.registry.gate(key)
    }

    pub fn indices(&self) -> &RoleIndices {
        &self.indices
    }

    pub fn reservation(&self, id: u64) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    pub fn reservation_for(&self, traveler: &TravelerIdentity) -> Option<&Reservation> {
        self.reservations.for_identity(traveler)
    }

    pub fn pending_reservations(&self) -> usize {
        self.reservations.len()
    }

    pub fn peer(&self, name: &str) -> Option<&PeerSession> {
        self.peers.get(name)
    }

    pub fn is_peer_connected(&self, name: &str) -> bool {
        self.peers.get(name).is_some_and(PeerSession::is_connected)
    }

    /// Gate owning the portal block at `coord`, if that gate is open.
    pub fn portal_at(&self, zone: &str, coord: BlockCoord) -> Option<&EndpointKey> {
        self.indices.lookup(BlockRole::Portal, zone, coord)
    }

    /// Whether breaking the block at `coord` should be refused.
    pub fn is_protected(&self, zone: &str, coord: BlockCoord) -> bool {
        self.indices
            .lookup(BlockRole::Build, zone, coord)
            .and_then(|owner| self.registry.gate(owner))
            .is_some_and(|gate| gate.options.protect)
    }

    /// Drains the events collected so far.
    pub fn take_events(&mut self) -> GateEvents {
        mem::take(&mut self.incoming_events)
    }

    // Tick

    /// Accepts and polls peer links, dispatches their messages, runs every
    /// due task and flushes outbound queues.
    pub fn update(&mut self, world: &mut dyn ZoneWorld) {
        self.accept_links();
        self.poll_pending_links(world);
        self.poll_peers(world);
        self.run_tasks(world);
        if self.announce_registry_events() {
            self.close_orphaned_gates(world);
        }
        self.flush_peers();
    }

    /// Runs one `update` and returns everything that happened.
    pub fn receive(&mut self, world: &mut dyn ZoneWorld) -> GateEvents {
        self.update(world);
        self.take_events()
    }

    fn run_tasks(&mut self, world: &mut dyn ZoneWorld) {
        let now = self.clock.now();
        while let Some(task) = self.tasks.pop_item(&now) {
            debug!("running {:?}", task);
            match task {
                Task::ReservationExpiry(id) => self.reservation_expired(world, id),
                Task::ArrivalTimeout(id) => self.arrival_timed_out(world, id),
                Task::GateAutoClose(key) => self.check_auto_close(world, &key),
                Task::PeerReconnect(peer) => self.reconnect_peer(&peer),
                Task::PeerKeepalive => self.keepalive(world),
            }
        }
    }

    pub(super) fn schedule(&mut self, due: Instant, task: Task) {
        self.tasks.add_item(due, task);
    }

    // Resolution

    /// Names `key` the way this process stores it: keys qualified with our
    /// own server name become local.
    pub(crate) fn localize(&self, key: &EndpointKey) -> EndpointKey {
        key.localized(&self.config.name)
    }

    /// Where `key` leads right now, or None when it cannot be reached.
    pub(crate) fn resolve(&self, key: &EndpointKey) -> Option<Destination> {
        let key = self.localize(key);
        match key.server() {
            None => self
                .registry
                .local(&key)
                .map(|_| Destination::Local(key.clone())),
            Some(server) => {
                if self.is_peer_connected(server) && self.registry.contains(&key) {
                    Some(Destination::Remote {
                        server: server.to_string(),
                        key,
                    })
                } else {
                    None
                }
            }
        }
    }

    pub(crate) fn route_tier(&self, from: Option<&EndpointKey>, to: &EndpointKey) -> RouteTier {
        if to.server().is_some() {
            return RouteTier::Server;
        }
        match from {
            Some(from) if from.same_zone(to) => RouteTier::Local,
            Some(_) => RouteTier::World,
            None => RouteTier::Local,
        }
    }

    pub(super) fn warn_integrity(&self, context: &str, key: &EndpointKey) {
        warn!("{}: endpoint {} vanished mid-operation on '{}'", context, key, self.config.name);
    }
}
