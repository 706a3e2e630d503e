/// Integration tests for gates linked across server processes
/// Covers the peer handshake, the reservation protocol and relayed traffic

use std::{collections::BTreeMap, time::Duration};

use gatelink_server::{
    shared::{BlockCoord, EndpointKey, EntityKind, Location, TravelerIdentity, TravelerSnapshot},
    ApiResponseEvent, ArrivalEvent, ChatEvent, DenialEvent, DepartureEvent, LinkEditEvent,
    PeerConnectEvent, PeerDisconnectEvent, Presence, PresenceEvent, ReservationError,
    ReservationState,
};
use gatelink_test::{build_doorway, origin, spawn_block, TestCluster, Transfer};

fn standing_at(coord: BlockCoord) -> Location {
    Location::new("world", coord.standing_point())
}

/// Cluster of `a` and `b` where `a`'s open gate g1 leads to `b`'s g2.
fn linked_pair() -> (TestCluster, EndpointKey, EndpointKey) {
    let mut cluster = TestCluster::new(&["a", "b"]);
    cluster.connect_all();
    let g2 = {
        let b = cluster.node("b");
        build_doorway(&mut b.server, &mut b.world, "world", "g2", origin(1)).unwrap()
    };
    cluster.settle();
    let remote_g2 = g2.qualified("b");
    let g1 = {
        let a = cluster.node("a");
        let g1 = build_doorway(&mut a.server, &mut a.world, "world", "g1", origin(0)).unwrap();
        a.server.add_link(&mut a.world, None, &g1, &remote_g2).unwrap();
        a.server.open_gate(&mut a.world, &g1).unwrap();
        g1
    };
    cluster.settle();
    (cluster, g1, g2)
}

/// Peers exchange rosters and learn each other's endpoints
#[test]
fn peers_exchange_rosters() {
    let mut cluster = TestCluster::new(&["a", "b"]);
    {
        let b = cluster.node("b");
        build_doorway(&mut b.server, &mut b.world, "world", "g2", origin(1)).unwrap();
    }

    cluster.connect_all();

    let a = cluster.node("a");
    let peers: Vec<String> = a.events().read::<PeerConnectEvent>().collect();
    assert_eq!(peers, vec!["b".to_string()]);
    assert!(a
        .server
        .registry()
        .contains(&EndpointKey::remote("b", "world", "g2")));
    let session = a.server.peer("b").unwrap();
    assert_eq!(session.public_address(), Some("play.b"));
}

/// Endpoints built after the handshake are announced to peers
#[test]
fn new_endpoints_are_announced() {
    let (mut cluster, _g1, _g2) = linked_pair();
    {
        let b = cluster.node("b");
        build_doorway(&mut b.server, &mut b.world, "world", "g3", origin(2)).unwrap();
    }
    cluster.settle();

    let a = cluster.node("a");
    assert!(a
        .server
        .registry()
        .contains(&EndpointKey::remote("b", "world", "g3")));
}

/// Opening a gate towards a remote endpoint attaches to it and opens it
#[test]
fn opening_attaches_across_servers() {
    let (mut cluster, g1, g2) = linked_pair();

    let b = cluster.node("b");
    let destination = b.server.gate(&g2).unwrap();
    assert!(destination.is_open());
    assert!(destination.incoming().contains(&g1.qualified("a")));
}

/// A player crossing to another server is approved, transferred and lands
/// once they join the destination
#[test]
fn player_crosses_to_a_peer() {
    let (mut cluster, g1, g2) = linked_pair();
    let alice = {
        let a = cluster.node("a");
        a.world.join("alice", standing_at(origin(0)))
    };
    let id = {
        let a = cluster.node("a");
        a.server.depart(&mut a.world, &alice, &g1).unwrap()
    };
    {
        let a = cluster.node("a");
        assert_eq!(a.server.reservation(id).unwrap().state(), ReservationState::Sent);
    }

    cluster.settle();

    {
        let a = cluster.node("a");
        assert_eq!(
            a.world.transfers,
            vec![Transfer {
                player: "alice".to_string(),
                server: "b".to_string(),
                address: Some("play.b".to_string()),
            }]
        );
        assert!(a.world.player("alice").is_none());
        assert_eq!(a.server.reservation(id).unwrap().state(), ReservationState::Approved);
    }

    {
        let b = cluster.node("b");
        b.world.join("alice", standing_at(origin(5)));
        b.server.player_joined(&mut b.world, "alice", "world");
        let landed = b.world.player("alice").unwrap();
        assert_eq!(landed.location.block(), spawn_block(origin(1)));
        assert!(b
            .world
            .messages_for(&alice)
            .contains(&"Welcome to g2 on b, alice".to_string()));
        let arrivals: Vec<_> = b.events().read::<ArrivalEvent>().collect();
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].to, g2);
        assert_eq!(arrivals[0].from, Some(g1.qualified("a")));
        assert_eq!(b.server.pending_reservations(), 0);
    }

    cluster.settle();

    let a = cluster.node("a");
    assert!(a.server.reservation(id).is_none());
    assert_eq!(a.server.pending_reservations(), 0);
    let departures: Vec<_> = a.events().read::<DepartureEvent>().collect();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].reservation, id);
}

/// Non-player travelers leave a surrogate behind until the peer confirms
/// the arrival
#[test]
fn entity_crosses_to_a_peer() {
    let (mut cluster, g1, _g2) = linked_pair();
    let cart = {
        let a = cluster.node("a");
        let cart = TravelerSnapshot::entity(EntityKind::Minecart, standing_at(origin(0)));
        let cart = a.world.add_entity(cart);
        a.server.depart(&mut a.world, &cart, &g1).unwrap();
        assert!(a.world.entities.is_empty());
        assert_eq!(a.world.surrogates.len(), 1);
        cart
    };

    cluster.settle();

    {
        let b = cluster.node("b");
        assert_eq!(b.world.entities.len(), 1);
        let arrived = b.world.entities.values().next().unwrap();
        assert_eq!(arrived.kind, EntityKind::Minecart);
        assert_eq!(arrived.location.block(), spawn_block(origin(1)));
    }
    let a = cluster.node("a");
    assert!(a.world.surrogates.is_empty());
    assert!(a.server.reservation_for(&cart).is_none());
    assert!(a.events().has::<DepartureEvent>());
}

/// Crossing towards a server that went away is refused and the traveler
/// stays put
#[test]
fn crossing_to_an_offline_server_is_refused() {
    let (mut cluster, g1, _g2) = linked_pair();
    // g0 keeps g1 open through its incoming link once b is gone
    {
        let a = cluster.node("a");
        let g0 = build_doorway(&mut a.server, &mut a.world, "world", "g0", origin(3)).unwrap();
        a.server.add_link(&mut a.world, None, &g0, &g1).unwrap();
        a.server.open_gate(&mut a.world, &g0).unwrap();
    }
    cluster.kill("b");
    cluster.settle();

    let a = cluster.node("a");
    assert!(!a.server.is_peer_connected("b"));
    assert!(a.events().has::<PeerDisconnectEvent>());
    assert!(a.server.gate(&g1).unwrap().is_open());
    let alice = a.world.join("alice", standing_at(origin(0)));

    let result = a.server.depart(&mut a.world, &alice, &g1);

    assert_eq!(
        result,
        Err(ReservationError::ServerOffline {
            server: "b".to_string()
        })
    );
    assert_eq!(a.world.player("alice").unwrap().location.block(), origin(0));
    assert_eq!(a.server.pending_reservations(), 0);
    let denials: Vec<_> = a.events().read::<DenialEvent>().collect();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].traveler, "alice");
}

/// A peer that never answers lets the reservation expire; the traveler is
/// restored where they stood
#[test]
fn unanswered_reservation_times_out() {
    let (mut cluster, g1, _g2) = linked_pair();
    let cart = TravelerSnapshot::entity(EntityKind::Minecart, standing_at(origin(0)));
    {
        let a = cluster.node("a");
        let identity = a.world.add_entity(cart.clone());
        a.server.depart(&mut a.world, &identity, &g1).unwrap();
        assert_eq!(a.world.surrogates.len(), 1);
    }

    cluster.advance_only("a", Duration::from_secs(11));

    let a = cluster.node("a");
    assert_eq!(a.server.pending_reservations(), 0);
    assert!(a.world.surrogates.is_empty());
    assert_eq!(a.world.entities.len(), 1);
    let restored = a.world.entities.values().next().unwrap();
    assert_eq!(restored.location, cart.location);
    let denials: Vec<_> = a.events().read::<DenialEvent>().collect();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].reason, ReservationError::TimedOut);
}

/// The destination refuses travelers when its gate policy forbids them
#[test]
fn destination_denial_reaches_the_sender() {
    let (mut cluster, g1, g2) = linked_pair();
    {
        let b = cluster.node("b");
        b.server
            .set_option(&mut b.world, &g2, "allowGameModes", "creative")
            .unwrap();
    }
    let alice = {
        let a = cluster.node("a");
        let alice = a.world.join("alice", standing_at(origin(0)));
        a.server.depart(&mut a.world, &alice, &g1).unwrap();
        alice
    };

    cluster.settle();

    let a = cluster.node("a");
    assert!(a.world.transfers.is_empty());
    assert!(a.world.player("alice").is_some());
    let denials: Vec<_> = a.events().read::<DenialEvent>().collect();
    assert_eq!(denials.len(), 1);
    assert!(matches!(denials[0].reason, ReservationError::Denied { .. }));
    assert!(!a.world.messages_for(&alice).is_empty());
}

/// A player who never shows up at the destination frees the reservation on
/// both sides
#[test]
fn transferred_player_who_never_arrives_times_out() {
    let (mut cluster, g1, _g2) = linked_pair();
    let id = {
        let a = cluster.node("a");
        let alice = a.world.join("alice", standing_at(origin(0)));
        a.server.depart(&mut a.world, &alice, &g1).unwrap()
    };
    cluster.settle();
    assert_eq!(cluster.node("b").server.pending_reservations(), 1);

    cluster.advance(Duration::from_secs(31));

    assert_eq!(cluster.node("b").server.pending_reservations(), 0);
    let a = cluster.node("a");
    assert!(a.server.reservation(id).is_none());
    let denials: Vec<_> = a.events().read::<DenialEvent>().collect();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].reason, ReservationError::TimedOut);
}

/// Chat lines and presence changes are relayed to peers
#[test]
fn chat_and_presence_are_relayed() {
    let (mut cluster, _g1, g2) = linked_pair();
    {
        let a = cluster.node("a");
        a.server.send_chat("alice", "hello", None);
        a.server.send_chat("alice", "psst", Some(vec![g2.qualified("b")]));
        a.server.player_quit("carol");
    }
    cluster.settle();

    let b = cluster.node("b");
    let mut events = b.events();
    let chats: Vec<_> = events.read::<ChatEvent>().collect();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].server, "a");
    assert_eq!(chats[0].message, "hello");
    assert_eq!(chats[0].to_gates, None);
    assert_eq!(chats[1].to_gates, Some(vec![g2.clone()]));
    let presence: Vec<_> = events.read::<PresenceEvent>().collect();
    assert_eq!(
        presence,
        vec![Presence::Quit {
            server: "a".to_string(),
            name: "carol".to_string()
        }]
    );
}

/// Remote calls return the peer's answer or its error text
#[test]
fn api_calls_are_answered() {
    let (mut cluster, _g1, _g2) = linked_pair();
    cluster.node("b").world.zone_times.insert("world".to_string(), 6000);
    let (time_request, bad_request) = {
        let a = cluster.node("a");
        let time_request = a
            .server
            .call_api("b", "world", "zone.time", BTreeMap::new())
            .unwrap();
        let bad_request = a
            .server
            .call_api("b", "world", "zone.weather", BTreeMap::new())
            .unwrap();
        (time_request, bad_request)
    };
    cluster.settle();

    let a = cluster.node("a");
    let responses: Vec<_> = a.events().read::<ApiResponseEvent>().collect();
    assert_eq!(responses.len(), 2);
    let time = responses.iter().find(|response| response.request_id == time_request).unwrap();
    assert_eq!(time.result, Ok(serde_json::json!(6000)));
    let bad = responses.iter().find(|response| response.request_id == bad_request).unwrap();
    assert_eq!(bad.result, Err("unknown method 'zone.weather'".to_string()));
}

/// A link can be added to a gate hosted by a peer
#[test]
fn remote_link_edits_complete() {
    let (mut cluster, g1, g2) = linked_pair();
    {
        let a = cluster.node("a");
        a.server
            .request_remote_link(Some("alice"), &g2.qualified("b"), &g1, true)
            .unwrap();
    }
    cluster.settle();

    {
        let b = cluster.node("b");
        assert!(b.server.gate(&g2).unwrap().has_link(&g1.qualified("a")));
    }
    let a = cluster.node("a");
    let edits: Vec<_> = a.events().read::<LinkEditEvent>().collect();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].added);
    assert_eq!(edits[0].player.as_deref(), Some("alice"));
    assert_eq!(edits[0].from, g2.qualified("b"));
    assert_eq!(edits[0].to, g1);
}

/// A restarted peer is dialed again and its fresh roster replaces the cache
#[test]
fn restarted_peer_reconnects() {
    let (mut cluster, g1, _g2) = linked_pair();
    cluster.kill("b");
    cluster.settle();
    assert!(!cluster.node("a").server.is_peer_connected("b"));

    cluster.restart("b");
    cluster.advance(Duration::from_secs(3));

    let a = cluster.node("a");
    assert!(a.server.is_peer_connected("b"));
    assert!(!a
        .server
        .registry()
        .contains(&EndpointKey::remote("b", "world", "g2")));
    // the link survives; it resolves again once b rebuilds g2
    assert!(a
        .server
        .gate(&g1)
        .unwrap()
        .has_link(&EndpointKey::remote("b", "world", "g2")));
}

/// A peer that goes away releases the gates it fed; they close and stay
/// closed when it comes back without them
#[test]
fn lost_peer_releases_inbound_gates() {
    let (mut cluster, g1, g2) = linked_pair();
    {
        let b = cluster.node("b");
        let destination = b.server.gate(&g2).unwrap();
        assert!(destination.is_open());
        assert!(destination.incoming().contains(&g1.qualified("a")));
    }

    cluster.kill("a");
    cluster.advance(Duration::from_secs(20));

    {
        let b = cluster.node("b");
        assert!(!b.server.is_peer_connected("a"));
        let destination = b.server.gate(&g2).unwrap();
        assert!(!destination.is_open());
        assert!(destination.incoming().is_empty());
    }

    cluster.restart("a");
    cluster.advance(Duration::from_secs(3));

    let b = cluster.node("b");
    assert!(b.server.is_peer_connected("a"));
    let destination = b.server.gate(&g2).unwrap();
    assert!(!destination.is_open());
    assert!(destination.incoming().is_empty());
}

/// A traveler holds at most one reservation; departing again supersedes it
#[test]
fn second_departure_supersedes_the_first() {
    let (mut cluster, g1, _g2) = linked_pair();
    let alice: TravelerIdentity = {
        let a = cluster.node("a");
        a.world.join("alice", standing_at(origin(0)))
    };
    let first = {
        let a = cluster.node("a");
        a.server.depart(&mut a.world, &alice, &g1).unwrap()
    };
    let second = {
        let a = cluster.node("a");
        a.server.depart(&mut a.world, &alice, &g1).unwrap()
    };
    assert_ne!(first, second);

    let a = cluster.node("a");
    assert!(a.server.reservation(first).is_none());
    assert_eq!(a.server.reservation_for(&alice).unwrap().local_id(), second);
    assert_eq!(a.server.pending_reservations(), 1);
}
