//! # Gatelink Shared
//! Common functionality shared between gatelink processes: block geometry,
//! spatial indices, traveler snapshots, the peer message vocabulary and the
//! clock/scheduler primitives the server runs on.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod endpoint_key;
mod messages;
mod spatial_index;
mod time_queue;
mod traveler;
mod types;

pub use endpoint_key::{EndpointKey, EndpointKeyError};
pub use messages::{
    codec::{decode, encode, MAX_FRAME_BYTES},
    error::MessageError,
    peer_message::{
        EndpointKindTag, EndpointSummary, PeerMessage, RemotePlayer, ReservationPayload,
        RosterData,
    },
};
pub use spatial_index::{BlockRole, IndexEntry, RoleSet, SpatialIndex, DEFAULT_BUCKETS};
pub use time_queue::{Clock, Instant, KeyGenerator, ManualClock, SystemClock, TimeQueue};
pub use traveler::{
    EntityId, EntityKind, ItemStack, PlayerIdentity, PlayerStats, StatusEffect,
    TravelerIdentity, TravelerSnapshot,
};
pub use types::{BlockClass, BlockCoord, BlockState, Direction, GameMode, Location, Vector, ZoneName};

/// Version of the peer protocol spoken by this build.
pub const PROTOCOL_VERSION: u32 = 3;
