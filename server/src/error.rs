use thiserror::Error;

use gatelink_shared::{EndpointKey, EndpointKeyError, MessageError};

/// Errors raised by the gate link state machine and endpoint mutators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Gate has no links to choose a destination from
    #[error("Gate has no links")]
    NoLinks,

    /// Gate has links but none is selected
    #[error("Gate has no link selected")]
    NoLinkSelected,

    /// Selected destination is not reachable right now (offline peer or destroyed endpoint)
    #[error("Destination '{destination}' cannot be resolved")]
    UnknownDestination { destination: EndpointKey },

    /// No endpoint is registered under the given name
    #[error("Unknown endpoint '{name}'")]
    UnknownEndpoint { name: String },

    /// Operation needs a gate but the endpoint is a volume or remote endpoint
    #[error("Endpoint '{name}' is not a local gate")]
    NotAGate { name: String },

    /// Another endpoint already uses the name
    #[error("An endpoint named '{name}' already exists")]
    DuplicateEndpoint { name: String },

    /// Endpoint names must be non-empty and must not contain '.'
    #[error("'{name}' is not a valid endpoint name")]
    InvalidName { name: String },

    /// New footprint overlaps blocks already owned by another gate
    #[error("Footprint overlaps gate '{owner}' at {coord}")]
    FootprintConflict { owner: EndpointKey, coord: String },

    /// Blocks in the world do not match the design
    #[error("Blocks at the build site do not match design '{design}'")]
    DesignMismatch { design: String },

    /// Gate options forbid this link
    #[error("Link not allowed: {reason}")]
    LinkNotAllowed { reason: &'static str },

    /// Option name not recognised
    #[error("Unknown option '{name}'")]
    UnknownOption { name: String },

    /// Option value could not be parsed for the option's type
    #[error("Invalid value '{value}' for option '{name}'")]
    InvalidOptionValue { name: String, value: String },

    /// Endpoint name failed to parse
    #[error("Bad endpoint name: {0}")]
    BadKey(#[from] EndpointKeyError),
}

/// Reasons a crossing is refused. `Display` is the text shown to the traveler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("You do not have permission to use this gate")]
    NotPermitted,

    #[error("A pin is required to use this gate")]
    PinRequired,

    #[error("Your pin is not valid for this gate")]
    InvalidPin,

    #[error("You need {cost} to travel this way")]
    InsufficientFunds { cost: String },

    #[error("You are not allowed to travel between these gates")]
    RouteDenied,

    #[error("Your game mode is not accepted at the destination")]
    GameModeNotAllowed,

    #[error("'{item}' is not allowed at the destination")]
    ItemNotAllowed { item: String },

    #[error("'{effect}' is not allowed at the destination")]
    EffectNotAllowed { effect: String },

    #[error("Server '{server}' is offline")]
    ServerOffline { server: String },

    #[error("Too many travelers are already on their way to '{server}'")]
    TooManyPending { server: String },

    /// Refused by the destination process, with its reason
    #[error("{reason}")]
    Denied { reason: String },

    #[error("The destination did not respond in time")]
    TimedOut,

    #[error("This gate has no destination")]
    NoDestination,

    #[error("The destination could not find a place to put you")]
    NoLanding,

    #[error("The traveler is no longer present")]
    TravelerGone,

    #[error("The gate is closed")]
    GateClosed,
}

/// Malformed or out-of-sequence peer traffic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed message from '{peer}': {source}")]
    Malformed {
        peer: String,
        #[source]
        source: MessageError,
    },

    #[error("Peer '{peer}' referenced unknown reservation {id} in '{command}'")]
    UnknownReservation {
        peer: String,
        id: u64,
        command: &'static str,
    },

    #[error("Reservation {id} cannot accept '{command}' in state {state}")]
    OutOfSequence {
        id: u64,
        state: &'static str,
        command: &'static str,
    },

    #[error("Peer '{peer}' speaks protocol version {theirs}, expected {ours}")]
    VersionMismatch { peer: String, theirs: u32, ours: u32 },

    #[error("Connection identified itself as unknown server '{server}'")]
    UnknownPeer { server: String },

    #[error("Peer '{peer}' sent '{command}' before identifying itself")]
    NotIdentified { peer: String, command: &'static str },

    #[error("Peer '{peer}' reported an error: {message}")]
    Remote { peer: String, message: String },
}

/// Persisted endpoint records that fail validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Record is not valid JSON: {reason}")]
    Malformed { reason: String },

    #[error("Record for '{name}' is missing {field}")]
    MissingField { name: String, field: &'static str },

    #[error("Record for '{name}' has invalid geometry: {reason}")]
    InvalidGeometry { name: String, reason: &'static str },

    #[error("Record for '{name}' links to '{link}' more than once")]
    DuplicateLink { name: String, link: EndpointKey },

    #[error("Record for '{name}' selects '{outgoing}' which is not one of its links")]
    DanglingOutgoing { name: String, outgoing: EndpointKey },

    #[error("Record for '{name}' belongs to zone '{found}', expected '{expected}'")]
    WrongZone {
        name: String,
        found: String,
        expected: String,
    },

    #[error("Record has an invalid name: {0}")]
    InvalidName(String),

    #[error("Record for '{name}' was refused: {reason}")]
    Refused { name: String, reason: String },
}

/// Errors raised by peer links
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Peer link is disconnected")]
    Disconnected,

    #[error("Failed to send frame to peer")]
    SendFailed,

    #[error("Nothing is listening at '{address}'")]
    ConnectFailed { address: String },

    #[error("Outbound queue for '{peer}' exceeded {limit} messages")]
    QueueOverflow { peer: String, limit: usize },

    #[error("No peer named '{peer}' is configured")]
    UnknownPeer { peer: String },

    #[error("Peer '{peer}' is not connected")]
    NotConnected { peer: String },

    #[error("Message could not be encoded: {0}")]
    Encode(#[from] MessageError),
}

/// Top level error type for the gate server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateServerError {
    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Reservation error: {0}")]
    Reservation(#[from] ReservationError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
