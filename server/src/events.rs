use std::{mem, vec::IntoIter};

use gatelink_shared::{EndpointKey, Location};

use crate::error::{GateServerError, ReservationError};

/// A traveler landed at an endpoint hosted here.
#[derive(Clone, Debug, PartialEq)]
pub struct Arrival {
    pub reservation: u64,
    pub traveler: String,
    pub from: Option<EndpointKey>,
    pub to: EndpointKey,
    pub location: Location,
}

/// A traveler that left from here landed at its destination.
#[derive(Clone, Debug, PartialEq)]
pub struct Departure {
    pub reservation: u64,
    pub traveler: String,
    pub from: Option<EndpointKey>,
    pub to: EndpointKey,
}

/// A crossing started here did not complete.
#[derive(Clone, Debug, PartialEq)]
pub struct Denial {
    pub reservation: u64,
    pub traveler: String,
    pub reason: ReservationError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayedChat {
    pub server: String,
    pub player: String,
    pub message: String,
    pub to_gates: Option<Vec<EndpointKey>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Presence {
    Joined { server: String, name: String, zone: String },
    Quit { server: String, name: String },
    Kicked { server: String, name: String, reason: String },
    ChangedWorld { server: String, name: String, zone: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub server: String,
    pub request_id: u64,
    pub result: Result<serde_json::Value, String>,
}

/// A peer finished a link edit we asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEdit {
    pub server: String,
    pub player: Option<String>,
    pub from: EndpointKey,
    pub to: EndpointKey,
    pub added: bool,
}

/// Everything that happened since the last drain.
pub struct GateEvents {
    arrivals: Vec<Arrival>,
    departures: Vec<Departure>,
    denials: Vec<Denial>,
    peer_connections: Vec<String>,
    peer_disconnections: Vec<String>,
    chats: Vec<RelayedChat>,
    presence: Vec<Presence>,
    api_responses: Vec<ApiResponse>,
    link_edits: Vec<LinkEdit>,
    gates_opened: Vec<EndpointKey>,
    gates_closed: Vec<EndpointKey>,
    errors: Vec<GateServerError>,

    empty: bool,
}

impl GateEvents {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: Vec::new(),
            departures: Vec::new(),
            denials: Vec::new(),
            peer_connections: Vec::new(),
            peer_disconnections: Vec::new(),
            chats: Vec::new(),
            presence: Vec::new(),
            api_responses: Vec::new(),
            link_edits: Vec::new(),
            gates_opened: Vec::new(),
            gates_closed: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: GateEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: GateEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_arrival(&mut self, arrival: Arrival) {
        self.arrivals.push(arrival);
        self.empty = false;
    }

    pub(crate) fn push_departure(&mut self, departure: Departure) {
        self.departures.push(departure);
        self.empty = false;
    }

    pub(crate) fn push_denial(&mut self, denial: Denial) {
        self.denials.push(denial);
        self.empty = false;
    }

    pub(crate) fn push_peer_connection(&mut self, peer: &str) {
        self.peer_connections.push(peer.to_string());
        self.empty = false;
    }

    pub(crate) fn push_peer_disconnection(&mut self, peer: &str) {
        self.peer_disconnections.push(peer.to_string());
        self.empty = false;
    }

    pub(crate) fn push_chat(&mut self, chat: RelayedChat) {
        self.chats.push(chat);
        self.empty = false;
    }

    pub(crate) fn push_presence(&mut self, presence: Presence) {
        self.presence.push(presence);
        self.empty = false;
    }

    pub(crate) fn push_api_response(&mut self, response: ApiResponse) {
        self.api_responses.push(response);
        self.empty = false;
    }

    pub(crate) fn push_link_edit(&mut self, edit: LinkEdit) {
        self.link_edits.push(edit);
        self.empty = false;
    }

    pub(crate) fn push_gate_opened(&mut self, key: &EndpointKey) {
        self.gates_opened.push(key.clone());
        self.empty = false;
    }

    pub(crate) fn push_gate_closed(&mut self, key: &EndpointKey) {
        self.gates_closed.push(key.clone());
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: GateServerError) {
        self.errors.push(error);
        self.empty = false;
    }
}

impl Default for GateEvents {
    fn default() -> Self {
        Self::new()
    }
}

// Event Trait
pub trait GateEvent {
    type Iter;

    fn iter(events: &mut GateEvents) -> Self::Iter;

    fn has(events: &GateEvents) -> bool;
}

macro_rules! gate_event {
    ($(#[$meta:meta])* $event:ident, $item:ty, $field:ident) => {
        $(#[$meta])*
        pub struct $event;
        impl GateEvent for $event {
            type Iter = IntoIter<$item>;

            fn iter(events: &mut GateEvents) -> Self::Iter {
                let list = mem::take(&mut events.$field);
                IntoIterator::into_iter(list)
            }

            fn has(events: &GateEvents) -> bool {
                !events.$field.is_empty()
            }
        }
    };
}

gate_event!(ArrivalEvent, Arrival, arrivals);
gate_event!(DepartureEvent, Departure, departures);
gate_event!(DenialEvent, Denial, denials);
gate_event!(
    /// Name of a peer whose roster exchange just completed
    PeerConnectEvent,
    String,
    peer_connections
);
gate_event!(PeerDisconnectEvent, String, peer_disconnections);
gate_event!(ChatEvent, RelayedChat, chats);
gate_event!(PresenceEvent, Presence, presence);
gate_event!(ApiResponseEvent, ApiResponse, api_responses);
gate_event!(LinkEditEvent, LinkEdit, link_edits);
gate_event!(GateOpenedEvent, EndpointKey, gates_opened);
gate_event!(GateClosedEvent, EndpointKey, gates_closed);
gate_event!(ErrorEvent, GateServerError, errors);
