/// Integration tests for saving and restoring endpoints as zones unload and
/// load

use std::time::Duration;

use gatelink_server::{
    shared::{BlockCoord, EndpointKey},
    EndpointRecord, GateClosedEvent, RecordError,
};
use gatelink_test::{build_doorway, origin, TestNode};

fn saved_pair() -> (Vec<EndpointRecord>, EndpointKey, EndpointKey) {
    let (mut node, _clock) = TestNode::standalone("a");
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();
    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    node.server.open_gate(&mut node.world, &g1).unwrap();
    let records = node.server.unload_zone("world");
    (records, g1, g2)
}

/// Only endpoints changed since the last save are returned
#[test]
fn dirty_records_are_taken_once() {
    let (mut node, _clock) = TestNode::standalone("a");
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();

    assert_eq!(node.server.take_dirty_records().len(), 2);
    assert!(node.server.take_dirty_records().is_empty());

    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    let records = node.server.take_dirty_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key(), g1);
}

/// Unloading a zone drops its endpoints and hands back their records
#[test]
fn unloading_returns_every_endpoint() {
    let (mut node, _clock) = TestNode::standalone("a");
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();
    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    node.server.open_gate(&mut node.world, &g1).unwrap();

    let records = node.server.unload_zone("world");

    assert_eq!(records.len(), 2);
    assert!(node.server.registry().is_empty());
    assert!(node.server.portal_at("world", origin(0)).is_none());
    assert!(!node.server.is_protected("world", origin(0) + BlockCoord::new(-1, 0, 0)));
    let EndpointRecord::Gate(saved) = records.iter().find(|record| record.key() == g1).unwrap() else {
        panic!("g1 saved as a volume");
    };
    assert!(saved.open);
    assert_eq!(saved.outgoing, Some(g2));
}

/// Records survive a trip through JSON and load back open and attached
#[test]
fn loading_restores_open_gates() {
    let (records, g1, g2) = saved_pair();
    let texts: Vec<String> = records.iter().map(|record| record.to_json().unwrap()).collect();
    let records: Vec<EndpointRecord> = texts
        .iter()
        .map(|text| EndpointRecord::from_json(text).unwrap())
        .collect();
    let (mut node, _clock) = TestNode::standalone("a");

    let errors = node.server.load_zone(&mut node.world, "world", records);

    assert!(errors.is_empty());
    let gate = node.server.gate(&g1).unwrap();
    assert!(gate.is_open());
    assert_eq!(gate.outgoing(), Some(&g2));
    assert!(node.server.gate(&g2).unwrap().incoming().contains(&g1));
    assert_eq!(node.server.portal_at("world", origin(0)), Some(&g1));
}

/// Records for another zone or with clashing blocks are skipped, the rest
/// load
#[test]
fn bad_records_are_reported_and_skipped() {
    let (mut records, g1, _g2) = saved_pair();
    let EndpointRecord::Gate(mut stray) = records[0].clone() else {
        panic!("expected a gate");
    };
    stray.zone = "nether".to_string();
    records.push(EndpointRecord::Gate(stray));
    let EndpointRecord::Gate(mut clash) = records
        .iter()
        .find(|record| record.key() == g1)
        .cloned()
        .unwrap()
    else {
        panic!("expected a gate");
    };
    clash.name = "g9".to_string();
    records.push(EndpointRecord::Gate(clash));
    let (mut node, _clock) = TestNode::standalone("a");

    let errors = node.server.load_zone(&mut node.world, "world", records);

    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|error| matches!(error, RecordError::WrongZone { .. })));
    assert!(errors
        .iter()
        .any(|error| matches!(error, RecordError::Refused { name, .. } if name == "g9")));
    assert_eq!(node.server.registry().len(), 2);
}

/// A temporary gate that was open when saved closes on schedule after
/// loading
#[test]
fn loaded_temporary_gates_close_on_schedule() {
    let (mut node, clock) = TestNode::standalone("a");
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();
    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    node.server.set_option(&mut node.world, &g1, "duration", "5000").unwrap();
    node.server.open_gate(&mut node.world, &g1).unwrap();
    let records = node.server.unload_zone("world");

    node.server.load_zone(&mut node.world, "world", records);
    node.events();
    clock.advance(Duration::from_secs(6));
    node.update();

    assert!(!node.server.gate(&g1).unwrap().is_open());
    let closed: Vec<EndpointKey> = node.events().read::<GateClosedEvent>().collect();
    assert!(closed.contains(&g1));
}

/// Unloading a zone releases the gates its open gates fed in other zones,
/// which then close, while the saved records keep the gates open
#[test]
fn unloading_detaches_from_other_zones() {
    let (mut node, _clock) = TestNode::standalone("a");
    let h = build_doorway(&mut node.server, &mut node.world, "world", "h", origin(1)).unwrap();
    let g = build_doorway(&mut node.server, &mut node.world, "nether", "g", origin(0)).unwrap();
    node.server.add_link(&mut node.world, None, &g, &h).unwrap();
    node.server.open_gate(&mut node.world, &g).unwrap();
    {
        let destination = node.server.gate(&h).unwrap();
        assert!(destination.is_open());
        assert!(destination.incoming().contains(&g));
    }
    node.events();

    let records = node.server.unload_zone("nether");
    node.update();

    let destination = node.server.gate(&h).unwrap();
    assert!(!destination.is_open());
    assert!(destination.incoming().is_empty());
    let closed: Vec<EndpointKey> = node.events().read::<GateClosedEvent>().collect();
    assert_eq!(closed, vec![h.clone()]);
    let EndpointRecord::Gate(saved) = records.iter().find(|record| record.key() == g).unwrap() else {
        panic!("g saved as a volume");
    };
    assert!(saved.open);

    // loading the zone again attaches and reopens the destination
    node.server.load_zone(&mut node.world, "nether", records);
    let destination = node.server.gate(&h).unwrap();
    assert!(destination.is_open());
    assert!(destination.incoming().contains(&g));
}

/// A saved source that is no longer open towards a gate is dropped when
/// the gate loads
#[test]
fn stale_sources_are_dropped_on_load() {
    let (records, g1, g2) = saved_pair();
    let records: Vec<EndpointRecord> = records.into_iter().filter(|record| record.key() != g1).collect();
    let (mut node, _clock) = TestNode::standalone("a");

    node.server.load_zone(&mut node.world, "world", records);
    node.update();

    let gate = node.server.gate(&g2).unwrap();
    assert!(gate.incoming().is_empty());
    assert!(!gate.is_open());
}
