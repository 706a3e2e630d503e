use std::time::Duration;

use gatelink_server::{
    shared::ManualClock,
    ChannelNetwork, GateEvents, GateServer, PeerSettings, ServerConfig,
};

use crate::{helpers::logging::init_logging, test_world::TestWorld};

/// One server process and the world it hosts.
pub struct TestNode {
    pub server: GateServer,
    pub world: TestWorld,
}

impl TestNode {
    /// Lone server with no peers, on its own manual clock.
    pub fn standalone(name: &str) -> (TestNode, ManualClock) {
        init_logging();
        let clock = ManualClock::starting_at(1_000);
        let network = ChannelNetwork::new();
        let config = ServerConfig {
            name: name.to_string(),
            ..ServerConfig::default()
        };
        let transport = network.bind(&address(name));
        let mut server = GateServer::new(config, Box::new(transport), Box::new(clock.clone()));
        server.seed_rng(7);
        let node = TestNode {
            server,
            world: TestWorld::new(),
        };
        (node, clock)
    }

    pub fn update(&mut self) {
        self.server.update(&mut self.world);
    }

    pub fn events(&mut self) -> GateEvents {
        self.server.take_events()
    }
}

pub fn address(name: &str) -> String {
    format!("{}:25565", name)
}

/// Several fully meshed servers on one in-memory network and one shared
/// manual clock. Earlier names dial later ones.
pub struct TestCluster {
    pub network: ChannelNetwork,
    pub clock: ManualClock,
    names: Vec<String>,
    nodes: Vec<Option<TestNode>>,
    tweak: fn(&mut ServerConfig),
}

impl TestCluster {
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, |_| {})
    }

    /// Builds the cluster, letting `tweak` adjust every server's config.
    pub fn with_config(names: &[&str], tweak: fn(&mut ServerConfig)) -> Self {
        init_logging();
        let mut cluster = TestCluster {
            network: ChannelNetwork::new(),
            clock: ManualClock::starting_at(1_000),
            names: names.iter().map(|name| name.to_string()).collect(),
            nodes: Vec::new(),
            tweak,
        };
        for index in 0..names.len() {
            let node = cluster.spawn(index);
            cluster.nodes.push(Some(node));
        }
        cluster
    }

    fn spawn(&self, index: usize) -> TestNode {
        let name = &self.names[index];
        let peers = self
            .names
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .map(|(other, peer)| {
                if index < other {
                    PeerSettings::dial(peer.clone(), address(peer))
                } else {
                    PeerSettings::accept(peer.clone())
                }
            })
            .collect();
        let mut config = ServerConfig {
            name: name.clone(),
            public_address: Some(format!("play.{}", name)),
            ..ServerConfig::default()
        };
        config.peer.peers = peers;
        (self.tweak)(&mut config);
        let transport = self.network.bind(&address(name));
        let mut server = GateServer::new(config, Box::new(transport), Box::new(self.clock.clone()));
        server.seed_rng(index as u64 + 1);
        TestNode {
            server,
            world: TestWorld::new(),
        }
    }

    fn index(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|known| known == name)
            .unwrap_or_else(|| panic!("no node named {}", name))
    }

    pub fn node(&mut self, name: &str) -> &mut TestNode {
        let index = self.index(name);
        self.nodes[index]
            .as_mut()
            .unwrap_or_else(|| panic!("node {} is down", name))
    }

    /// Mutable access to two different nodes at once.
    pub fn pair(&mut self, a: &str, b: &str) -> (&mut TestNode, &mut TestNode) {
        let (a_index, b_index) = (self.index(a), self.index(b));
        assert_ne!(a_index, b_index);
        let (low, high) = (a_index.min(b_index), a_index.max(b_index));
        let (left, right) = self.nodes.split_at_mut(high);
        let low_node = left[low].as_mut().expect("node is down");
        let high_node = right[0].as_mut().expect("node is down");
        if a_index < b_index {
            (low_node, high_node)
        } else {
            (high_node, low_node)
        }
    }

    /// One update on every running node.
    pub fn tick(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.update();
        }
    }

    /// Enough ticks for any request and its replies to cross the network.
    pub fn settle(&mut self) {
        for _ in 0..6 {
            self.tick();
        }
    }

    /// Moves the shared clock forward in small steps, settling after each.
    pub fn advance(&mut self, duration: Duration) {
        let step = Duration::from_millis(500);
        let mut remaining = duration;
        while !remaining.is_zero() {
            let next = remaining.min(step);
            self.clock.advance(next);
            remaining -= next;
            self.settle();
        }
    }

    /// Moves the shared clock forward while only `name` keeps running, as
    /// if every other process had hung.
    pub fn advance_only(&mut self, name: &str, duration: Duration) {
        let step = Duration::from_millis(500);
        let mut remaining = duration;
        while !remaining.is_zero() {
            let next = remaining.min(step);
            self.clock.advance(next);
            remaining -= next;
            self.node(name).update();
        }
    }

    /// Stops a node as if its process died. Its links close.
    pub fn kill(&mut self, name: &str) -> TestNode {
        let index = self.index(name);
        self.network.unbind(&address(name));
        self.nodes[index]
            .take()
            .unwrap_or_else(|| panic!("node {} is already down", name))
    }

    /// Starts a fresh process under a name that was killed.
    pub fn restart(&mut self, name: &str) -> &mut TestNode {
        let index = self.index(name);
        let node = self.spawn(index);
        self.nodes[index] = Some(node);
        self.node(name)
    }

    /// Brings every peer session up.
    pub fn connect_all(&mut self) {
        self.settle();
        for index in 0..self.names.len() {
            let name = self.names[index].clone();
            let Some(node) = self.nodes[index].as_ref() else {
                continue;
            };
            for peer in self.names.iter().filter(|peer| **peer != name) {
                let up = self.nodes[self.index(peer)].is_some();
                assert!(
                    !up || node.server.is_peer_connected(peer),
                    "{} never connected to {}",
                    name,
                    peer
                );
            }
        }
    }
}
