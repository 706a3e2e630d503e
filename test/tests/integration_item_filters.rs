/// Integration tests for the item and effect filters of arrival endpoints

use gatelink_server::{
    shared::{BlockCoord, EndpointKey, ItemStack, Location, StatusEffect},
    ReservationError,
};
use gatelink_test::{build_doorway, origin, spawn_block, TestCluster, TestNode};

fn standing_at(coord: BlockCoord) -> Location {
    Location::new("world", coord.standing_point())
}

fn stack(kind: &str) -> Option<ItemStack> {
    Some(ItemStack::new(kind, 1))
}

/// g1 leads to g2; g2's item table replaces tnt with sand and only allows
/// dirt and sand.
fn filtered_pair(node: &mut TestNode) -> (EndpointKey, EndpointKey) {
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();
    let mut policy = node.server.endpoint(&g2).unwrap().policy.clone();
    policy.items.replace.insert("tnt".into(), "sand".into());
    policy.items.allow.insert("dirt".into());
    policy.items.allow.insert("sand".into());
    node.server.set_policy(&g2, policy).unwrap();
    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    node.server.open_gate(&mut node.world, &g1).unwrap();
    (g1, g2)
}

/// Replaced items change kind, disallowed items are dropped and the player
/// is told about both
#[test]
fn arrival_filters_rewrite_the_inventory() {
    let (mut node, _clock) = TestNode::standalone("a");
    let (g1, _g2) = filtered_pair(&mut node);
    let alice = node.world.join("alice", standing_at(origin(0)));
    node.world.player_mut("alice").unwrap().inventory = vec![stack("dirt"), stack("tnt"), stack("diamond")];

    node.server.depart(&mut node.world, &alice, &g1).unwrap();

    let landed = node.world.player("alice").unwrap();
    assert_eq!(landed.location.block(), spawn_block(origin(1)));
    assert_eq!(landed.inventory, vec![stack("dirt"), stack("sand"), None]);
    let messages = node.world.messages_for(&alice);
    assert!(messages.contains(&"Your item 'tnt' was replaced by 'sand'".to_string()));
    assert!(messages.contains(&"Your item 'diamond' was not allowed and was removed".to_string()));
}

/// With requireAllowedItems a single disallowed item refuses the crossing
#[test]
fn required_items_refuse_the_crossing() {
    let (mut node, _clock) = TestNode::standalone("a");
    let (g1, g2) = filtered_pair(&mut node);
    node.server
        .set_option(&mut node.world, &g2, "requireAllowedItems", "true")
        .unwrap();
    let alice = node.world.join("alice", standing_at(origin(0)));
    node.world.player_mut("alice").unwrap().inventory = vec![stack("dirt"), stack("diamond")];

    let result = node.server.depart(&mut node.world, &alice, &g1);

    assert_eq!(
        result,
        Err(ReservationError::ItemNotAllowed {
            item: "diamond".to_string()
        })
    );
    let stayed = node.world.player("alice").unwrap();
    assert_eq!(stayed.location.block(), origin(0));
    assert_eq!(stayed.inventory, vec![stack("dirt"), stack("diamond")]);
    assert_eq!(node.server.pending_reservations(), 0);
}

/// An unchanged inventory is left alone on a local crossing
#[test]
fn clean_inventory_passes_untouched() {
    let (mut node, _clock) = TestNode::standalone("a");
    let (g1, _g2) = filtered_pair(&mut node);
    let alice = node.world.join("alice", standing_at(origin(0)));
    node.world.player_mut("alice").unwrap().inventory = vec![stack("dirt"), None, stack("sand")];

    node.server.depart(&mut node.world, &alice, &g1).unwrap();

    let landed = node.world.player("alice").unwrap();
    assert_eq!(landed.inventory, vec![stack("dirt"), None, stack("sand")]);
    assert!(!node
        .world
        .messages_for(&alice)
        .iter()
        .any(|message| message.starts_with("Your item")));
}

/// Banned status effects are stripped on arrival
#[test]
fn banned_effects_are_removed() {
    let (mut node, _clock) = TestNode::standalone("a");
    let g1 = build_doorway(&mut node.server, &mut node.world, "world", "g1", origin(0)).unwrap();
    let g2 = build_doorway(&mut node.server, &mut node.world, "world", "g2", origin(1)).unwrap();
    let mut policy = node.server.endpoint(&g2).unwrap().policy.clone();
    policy.effects.ban.insert("poison".into());
    node.server.set_policy(&g2, policy).unwrap();
    node.server.add_link(&mut node.world, None, &g1, &g2).unwrap();
    node.server.open_gate(&mut node.world, &g1).unwrap();
    let alice = node.world.join("alice", standing_at(origin(0)));
    node.world.player_mut("alice").unwrap().effects =
        vec![StatusEffect::new("speed", 200, 1), StatusEffect::new("poison", 100, 0)];

    node.server.depart(&mut node.world, &alice, &g1).unwrap();

    let landed = node.world.player("alice").unwrap();
    assert_eq!(landed.effects, vec![StatusEffect::new("speed", 200, 1)]);
    assert!(node
        .world
        .messages_for(&alice)
        .contains(&"Your effect 'poison' was not allowed and was removed".to_string()));
}

/// The destination process filters what a player brings from a peer and
/// restores the rest onto the joining player
#[test]
fn filters_apply_to_players_from_peers() {
    let mut cluster = TestCluster::new(&["a", "b"]);
    cluster.connect_all();
    let g2 = {
        let b = cluster.node("b");
        let g2 = build_doorway(&mut b.server, &mut b.world, "world", "g2", origin(1)).unwrap();
        let mut policy = b.server.endpoint(&g2).unwrap().policy.clone();
        policy.items.ban.insert("diamond".into());
        b.server.set_policy(&g2, policy).unwrap();
        g2
    };
    cluster.settle();
    let alice = {
        let a = cluster.node("a");
        let g1 = build_doorway(&mut a.server, &mut a.world, "world", "g1", origin(0)).unwrap();
        a.server.add_link(&mut a.world, None, &g1, &g2.qualified("b")).unwrap();
        a.server.open_gate(&mut a.world, &g1).unwrap();
        let alice = a.world.join("alice", standing_at(origin(0)));
        a.world.player_mut("alice").unwrap().inventory = vec![stack("dirt"), stack("diamond")];
        a.server.depart(&mut a.world, &alice, &g1).unwrap();
        alice
    };
    cluster.settle();

    let b = cluster.node("b");
    b.world.join("alice", standing_at(origin(5)));
    b.server.player_joined(&mut b.world, "alice", "world");

    let landed = b.world.player("alice").unwrap();
    assert_eq!(landed.inventory, vec![stack("dirt"), None]);
    assert!(b
        .world
        .messages_for(&alice)
        .contains(&"Your item 'diamond' was not allowed and was removed".to_string()));
}

/// The filters are usable straight from the crate root: `none` removes a
/// kind, a wildcard replacement rewrites every other kind
#[test]
fn filters_apply_through_the_public_api() {
    use gatelink_server::{filter_effects, filter_items, FilterTable, GATE_OPTIONS, NOTHING, POLICY_OPTIONS, WILDCARD};

    let mut items = FilterTable::default();
    items.replace.insert("tnt".into(), NOTHING.into());
    items.allow.insert("dirt".into());
    let filtered = filter_items(&items, &[stack("dirt"), stack("tnt"), None, stack("stone")]);
    assert_eq!(filtered.kept, vec![stack("dirt"), None, None, None]);
    assert_eq!(filtered.rejected, vec!["tnt".to_string(), "stone".to_string()]);
    assert!(filtered.replaced.is_empty());

    let mut effects = FilterTable::default();
    effects.replace.insert(WILDCARD.into(), "speed".into());
    let poison = StatusEffect::new("poison", 200, 1);
    let filtered = filter_effects(&effects, &[poison.clone(), StatusEffect::new("speed", 100, 0)]);
    assert_eq!(
        filtered.kept,
        vec![poison.with_kind("speed"), StatusEffect::new("speed", 100, 0)]
    );
    assert_eq!(filtered.replaced, vec![("poison".to_string(), "speed".to_string())]);
    assert_eq!(filtered.notices("effect"), vec!["Your effect 'poison' was replaced by 'speed'".to_string()]);

    assert!(GATE_OPTIONS.contains(&"duration"));
    assert!(!POLICY_OPTIONS.is_empty());
}
