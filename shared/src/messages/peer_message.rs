use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    endpoint_key::EndpointKey,
    traveler::TravelerSnapshot,
    types::{Direction, Location},
};

/// Whether an endpoint is a portal gate or a plain volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKindTag {
    Gate,
    Volume,
}

/// What a peer publishes about one of its local endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub kind: EndpointKindTag,
    pub zone: String,
    pub name: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub open: bool,
}

impl EndpointSummary {
    /// Key of the summarized endpoint as seen from the peer called `server`.
    pub fn key_on(&self, server: &str) -> EndpointKey {
        EndpointKey::remote(server, self.zone.clone(), self.name.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlayer {
    pub name: String,
    pub zone: String,
}

/// Full roster a process publishes to each peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterData {
    pub server_name: String,
    #[serde(default)]
    pub cluster: Option<String>,
    pub protocol_version: u32,
    #[serde(default)]
    pub public_address: Option<String>,
    #[serde(default)]
    pub private_address: Option<String>,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub players: Vec<RemotePlayer>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSummary>,
}

/// The traveler and routing carried by a cross-process reservation.
///
/// `from` is named the way the sending process names it, `to` the way the
/// receiving process names it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    pub id: u64,
    pub traveler: TravelerSnapshot,
    #[serde(default)]
    pub from: Option<EndpointKey>,
    #[serde(default)]
    pub from_direction: Option<Direction>,
    #[serde(default)]
    pub to: Option<EndpointKey>,
    #[serde(default)]
    pub to_location: Option<Location>,
}

/// Every logical message exchanged over an open peer session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PeerMessage {
    #[serde(rename_all = "camelCase")]
    Refresh {
        server_name: String,
        protocol_version: u32,
    },
    RefreshData(RosterData),
    EndpointAdded {
        endpoint: EndpointSummary,
    },
    #[serde(rename_all = "camelCase")]
    EndpointRenamed {
        old_key: EndpointKey,
        new_name: String,
    },
    EndpointRemoved {
        endpoint: EndpointKey,
    },
    EndpointDestroyed {
        endpoint: EndpointKey,
    },
    EndpointAttach {
        to: EndpointKey,
        from: EndpointKey,
    },
    EndpointDetach {
        to: EndpointKey,
        from: EndpointKey,
    },
    Reservation(ReservationPayload),
    ReservationApproved {
        id: u64,
    },
    ReservationDenied {
        id: u64,
        reason: String,
    },
    ReservationArrived {
        id: u64,
    },
    /// `id` is always the sending side's id. `from_sender` tells the
    /// recipient which of its tables to look in.
    #[serde(rename_all = "camelCase")]
    ReservationTimeout {
        id: u64,
        #[serde(default)]
        from_sender: bool,
    },
    LinkAdd {
        player: Option<String>,
        from: EndpointKey,
        to: EndpointKey,
    },
    LinkAddComplete {
        player: Option<String>,
        from: EndpointKey,
        to: EndpointKey,
    },
    LinkRemove {
        player: Option<String>,
        from: EndpointKey,
        to: EndpointKey,
    },
    LinkRemoveComplete {
        player: Option<String>,
        from: EndpointKey,
        to: EndpointKey,
    },
    #[serde(rename_all = "camelCase")]
    Chat {
        player: String,
        message: String,
        #[serde(default)]
        to_gates: Option<Vec<EndpointKey>>,
    },
    PlayerJoined {
        name: String,
        zone: String,
    },
    PlayerQuit {
        name: String,
    },
    PlayerKicked {
        name: String,
        reason: String,
    },
    PlayerChangedWorld {
        name: String,
        zone: String,
    },
    #[serde(rename_all = "camelCase")]
    Api {
        request_id: u64,
        target: String,
        method: String,
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    ApiResult {
        request_id: u64,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Ping {
        time: u64,
    },
    Pong {
        time: u64,
    },
    Nop,
    Error {
        message: String,
    },
}

impl PeerMessage {
    /// Wire name of the message, for logs.
    pub fn command(&self) -> &'static str {
        match self {
            PeerMessage::Refresh { .. } => "refresh",
            PeerMessage::RefreshData(_) => "refreshData",
            PeerMessage::EndpointAdded { .. } => "endpointAdded",
            PeerMessage::EndpointRenamed { .. } => "endpointRenamed",
            PeerMessage::EndpointRemoved { .. } => "endpointRemoved",
            PeerMessage::EndpointDestroyed { .. } => "endpointDestroyed",
            PeerMessage::EndpointAttach { .. } => "endpointAttach",
            PeerMessage::EndpointDetach { .. } => "endpointDetach",
            PeerMessage::Reservation(_) => "reservation",
            PeerMessage::ReservationApproved { .. } => "reservationApproved",
            PeerMessage::ReservationDenied { .. } => "reservationDenied",
            PeerMessage::ReservationArrived { .. } => "reservationArrived",
            PeerMessage::ReservationTimeout { .. } => "reservationTimeout",
            PeerMessage::LinkAdd { .. } => "linkAdd",
            PeerMessage::LinkAddComplete { .. } => "linkAddComplete",
            PeerMessage::LinkRemove { .. } => "linkRemove",
            PeerMessage::LinkRemoveComplete { .. } => "linkRemoveComplete",
            PeerMessage::Chat { .. } => "chat",
            PeerMessage::PlayerJoined { .. } => "playerJoined",
            PeerMessage::PlayerQuit { .. } => "playerQuit",
            PeerMessage::PlayerKicked { .. } => "playerKicked",
            PeerMessage::PlayerChangedWorld { .. } => "playerChangedWorld",
            PeerMessage::Api { .. } => "api",
            PeerMessage::ApiResult { .. } => "apiResult",
            PeerMessage::Ping { .. } => "ping",
            PeerMessage::Pong { .. } => "pong",
            PeerMessage::Nop => "nop",
            PeerMessage::Error { .. } => "error",
        }
    }
}
