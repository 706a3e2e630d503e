//! # Gatelink Server
//! The gate service of one server process: tracks portal gates and volumes,
//! links them into a graph spanning several processes, and moves travelers
//! along those links with a reservation handshake between peers.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use gatelink_shared::{
        BlockClass, BlockCoord, BlockRole, BlockState, Clock, Direction, EndpointKey, EntityId,
        EntityKind, GameMode, Instant, ItemStack, Location, ManualClock, PlayerIdentity,
        PlayerStats, RemotePlayer, StatusEffect, SystemClock, TravelerIdentity,
        TravelerSnapshot, Vector, PROTOCOL_VERSION,
    };
}

mod endpoint;
mod error;
mod events;
mod peer;
mod record;
mod reservation;
mod server;
mod spawn;
mod world;

pub use endpoint::{
    CostTable, DesignBlock, Endpoint, EndpointPolicy, EndpointRegistry, FilterOutcome,
    FilterTable, Gate, GateBlock, GateDesign, GateOptions, LocalEndpoint, LocalShape,
    MessageTemplates, RemoteEndpoint, RoleIndices, RouteTier, SearchAxis, SpawnSearch, Volume,
    GATE_OPTIONS, NOTHING, POLICY_OPTIONS, WILDCARD,
};
pub use error::{
    GateError, GateServerError, ProtocolError, RecordError, ReservationError, TransportError,
};
pub use events::{
    ApiResponse, ApiResponseEvent, Arrival, ArrivalEvent, ChatEvent, Denial, DenialEvent,
    Departure, DepartureEvent, ErrorEvent, GateClosedEvent, GateEvent, GateEvents,
    GateOpenedEvent, LinkEdit, LinkEditEvent, PeerConnectEvent, PeerDisconnectEvent, Presence,
    PresenceEvent, RelayedChat,
};
pub use peer::{ChannelLink, ChannelNetwork, ChannelTransport, PeerLink, PeerSession, PeerTransport};
pub use record::{EndpointRecord, GateRecord, VolumeRecord};
pub use reservation::{
    filter_effects, filter_items, Filtered, Reservation, ReservationSide, ReservationState,
};
pub use server::{GateConfig, GateServer, PeerConfig, PeerSettings, ReservationConfig, ServerConfig};
pub use world::{AllowAll, Economy, FreeEconomy, Permissions, ZoneWorld};
