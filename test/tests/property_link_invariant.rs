/// PROPERTY-BASED TESTS: Gate link invariants
///
/// Drives a server with random link edits, cycling and open/close toggles.
///
/// Key invariants:
/// 1. The selected outgoing link is always one of the gate's links
/// 2. A gate never lists the same link twice
/// 3. Portal blocks are indexed exactly while their gate is open

use proptest::prelude::*;

use gatelink_server::shared::{BlockCoord, EndpointKey};
use gatelink_test::{build_doorway, origin, TestNode};

const GATES: usize = 4;

#[derive(Clone, Debug)]
enum Op {
    Link(usize, usize),
    Unlink(usize, usize),
    Next(usize),
    Toggle(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..GATES, 0..GATES).prop_map(|(from, to)| Op::Link(from, to)),
        (0..GATES, 0..GATES).prop_map(|(from, to)| Op::Unlink(from, to)),
        (0..GATES).prop_map(Op::Next),
        (0..GATES).prop_map(Op::Toggle),
    ]
}

fn doorways(node: &mut TestNode) -> Vec<EndpointKey> {
    (0..GATES)
        .map(|index| {
            let name = format!("g{}", index);
            build_doorway(&mut node.server, &mut node.world, "world", &name, origin(index as i32)).unwrap()
        })
        .collect()
}

fn apply(node: &mut TestNode, gates: &[EndpointKey], op: &Op) {
    // refusals are expected; only the resulting state matters
    let _ = match *op {
        Op::Link(from, to) => node
            .server
            .add_link(&mut node.world, None, &gates[from], &gates[to])
            .map(|_| ()),
        Op::Unlink(from, to) => node
            .server
            .remove_link(&mut node.world, &gates[from], &gates[to])
            .map(|_| ()),
        Op::Next(index) => node.server.next_link(&mut node.world, &gates[index]),
        Op::Toggle(index) => {
            let open = node.server.gate(&gates[index]).is_some_and(|gate| gate.is_open());
            if open {
                node.server.close_gate(&mut node.world, &gates[index])
            } else {
                node.server.open_gate(&mut node.world, &gates[index])
            }
        }
    };
}

proptest! {
    /// Outgoing stays within links and links stay unique
    #[test]
    fn prop_outgoing_is_always_a_link(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (mut node, _clock) = TestNode::standalone("a");
        let gates = doorways(&mut node);

        for op in ops.iter() {
            apply(&mut node, &gates, op);
            for key in gates.iter() {
                let gate = node.server.gate(key).unwrap();
                prop_assert!(gate.link_invariant_holds(), "{} broke the invariant after {:?}", key, op);
                let mut links = gate.links().to_vec();
                links.sort();
                links.dedup();
                prop_assert_eq!(links.len(), gate.links().len());
            }
        }
    }

    /// Portal lookups follow the open state of their gate
    #[test]
    fn prop_portal_index_matches_open_state(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (mut node, _clock) = TestNode::standalone("a");
        let gates = doorways(&mut node);

        for op in ops.iter() {
            apply(&mut node, &gates, op);
        }
        for (index, key) in gates.iter().enumerate() {
            let open = node.server.gate(key).unwrap().is_open();
            for height in 0..2 {
                let coord = origin(index as i32) + BlockCoord::new(0, height, 0);
                let found = node.server.portal_at("world", coord);
                if open {
                    prop_assert_eq!(found, Some(key));
                } else {
                    prop_assert_eq!(found, None);
                }
            }
        }
    }
}
