use std::fmt;

use gatelink_shared::{
    Direction, EndpointKey, EntityId, Instant, ItemStack, Location, StatusEffect,
    TravelerIdentity, TravelerSnapshot, Vector,
};

use crate::error::ProtocolError;

/// Where a reservation sits in the crossing handshake.
///
/// Sender side: `Created -> DepartureChecked -> Sent -> Approved -> Arrived`,
/// ending early in `Denied` or `TimedOut`. Receiver side:
/// `Received -> ArrivalChecked -> Arrived | ArrivalTimedOut`, or `Denied`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationState {
    Created,
    DepartureChecked,
    Sent,
    Approved,
    Arrived,
    Denied,
    TimedOut,
    Received,
    ArrivalChecked,
    ArrivalTimedOut,
}

impl ReservationState {
    pub fn name(&self) -> &'static str {
        match self {
            ReservationState::Created => "created",
            ReservationState::DepartureChecked => "departureChecked",
            ReservationState::Sent => "sent",
            ReservationState::Approved => "approved",
            ReservationState::Arrived => "arrived",
            ReservationState::Denied => "denied",
            ReservationState::TimedOut => "timedOut",
            ReservationState::Received => "received",
            ReservationState::ArrivalChecked => "arrivalChecked",
            ReservationState::ArrivalTimedOut => "arrivalTimedOut",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationState::Arrived
                | ReservationState::Denied
                | ReservationState::TimedOut
                | ReservationState::ArrivalTimedOut
        )
    }

    fn can_become(&self, next: ReservationState) -> bool {
        use ReservationState::*;
        matches!(
            (self, next),
            (Created, DepartureChecked)
                | (Created, Denied)
                | (DepartureChecked, Sent)
                | (DepartureChecked, Arrived)
                | (DepartureChecked, Denied)
                | (Sent, Approved)
                | (Sent, Denied)
                | (Sent, TimedOut)
                | (Approved, Arrived)
                | (Approved, Denied)
                | (Approved, TimedOut)
                | (Received, ArrivalChecked)
                | (Received, Denied)
                | (ArrivalChecked, Arrived)
                | (ArrivalChecked, ArrivalTimedOut)
                | (ArrivalChecked, Denied)
        )
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which end of the handshake this process plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationSide {
    /// Both endpoints are hosted here
    Local,
    /// We are sending the traveler to `peer`
    Outbound { peer: String },
    /// `peer` is sending us the traveler under its id `remote_id`
    Inbound { peer: String, remote_id: u64 },
}

/// Traveler state after the arrival endpoint's filters ran.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrivalPlan {
    pub inventory: Vec<Option<ItemStack>>,
    pub armor: Vec<Option<ItemStack>>,
    pub effects: Vec<StatusEffect>,
    /// Anything the filters changed, for the traveler
    pub notices: Vec<String>,
    /// Amount charged once the traveler lands
    pub receive_cost: f64,
    pub items_changed: bool,
    pub effects_changed: bool,
}

/// One crossing in flight.
#[derive(Clone, Debug)]
pub struct Reservation {
    local_id: u64,
    side: ReservationSide,
    state: ReservationState,
    /// Absent for inbound non-players, which have no local identity yet
    pub identity: Option<TravelerIdentity>,
    pub traveler: TravelerSnapshot,
    pub departure: Option<EndpointKey>,
    pub departure_direction: Option<Direction>,
    pub arrival: Option<EndpointKey>,
    pub destination_server: Option<String>,
    pub destination: Option<Location>,
    pub velocity: Vector,
    pub plan: Option<ArrivalPlan>,
    /// Charged to the traveler on the sending side once the crossing lands
    pub send_cost: f64,
    pub surrogate: Option<EntityId>,
    pub created_at: Instant,
    /// The sender-side expiry only counts once `now` reaches this
    pub expires_at: Option<Instant>,
}

impl Reservation {
    pub fn new(
        local_id: u64,
        side: ReservationSide,
        identity: Option<TravelerIdentity>,
        traveler: TravelerSnapshot,
        now: Instant,
    ) -> Self {
        let state = match side {
            ReservationSide::Inbound { .. } => ReservationState::Received,
            _ => ReservationState::Created,
        };
        Self {
            local_id,
            side,
            state,
            identity,
            traveler,
            departure: None,
            departure_direction: None,
            arrival: None,
            destination_server: None,
            destination: None,
            velocity: Vector::ZERO,
            plan: None,
            send_cost: 0.0,
            surrogate: None,
            created_at: now,
            expires_at: None,
        }
    }

    pub fn local_id(&self) -> u64 {
        self.local_id
    }

    pub fn side(&self) -> &ReservationSide {
        &self.side
    }

    pub fn state(&self) -> ReservationState {
        self.state
    }

    pub fn remote_id(&self) -> Option<u64> {
        match &self.side {
            ReservationSide::Inbound { remote_id, .. } => Some(*remote_id),
            _ => None,
        }
    }

    /// Peer on the other end of the handshake, if any.
    pub fn peer(&self) -> Option<&str> {
        match &self.side {
            ReservationSide::Local => None,
            ReservationSide::Outbound { peer } | ReservationSide::Inbound { peer, .. } => Some(peer),
        }
    }

    pub fn is_outbound(&self) -> bool {
        matches!(self.side, ReservationSide::Outbound { .. })
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self.side, ReservationSide::Inbound { .. })
    }

    /// Moves to `next`, refusing transitions the handshake does not allow.
    pub fn advance(
        &mut self,
        next: ReservationState,
        command: &'static str,
    ) -> Result<(), ProtocolError> {
        if !self.state.can_become(next) {
            return Err(ProtocolError::OutOfSequence {
                id: self.local_id,
                state: self.state.name(),
                command,
            });
        }
        self.state = next;
        Ok(())
    }
}
