use gatelink_shared::{Direction, EndpointKey, EndpointKindTag, EndpointSummary};

use crate::endpoint::{gate::Gate, policy::EndpointPolicy, volume::Volume};

/// Geometry of an endpoint hosted by this process.
#[derive(Clone, Debug)]
pub enum LocalShape {
    Gate(Gate),
    Volume(Volume),
}

/// Endpoint physically hosted here. Persisted, owns its policy.
#[derive(Clone, Debug)]
pub struct LocalEndpoint {
    key: EndpointKey,
    pub policy: EndpointPolicy,
    pub shape: LocalShape,
    dirty: bool,
}

impl LocalEndpoint {
    pub fn new(key: EndpointKey, policy: EndpointPolicy, shape: LocalShape) -> Self {
        Self {
            key,
            policy,
            shape,
            dirty: true,
        }
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    pub fn gate(&self) -> Option<&Gate> {
        match &self.shape {
            LocalShape::Gate(gate) => Some(gate),
            LocalShape::Volume(_) => None,
        }
    }

    pub fn gate_mut(&mut self) -> Option<&mut Gate> {
        match &mut self.shape {
            LocalShape::Gate(gate) => Some(gate),
            LocalShape::Volume(_) => None,
        }
    }

    pub fn volume(&self) -> Option<&Volume> {
        match &self.shape {
            LocalShape::Volume(volume) => Some(volume),
            LocalShape::Gate(_) => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match &self.shape {
            LocalShape::Gate(gate) => gate.direction,
            LocalShape::Volume(volume) => volume.direction,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_key(&mut self, key: EndpointKey) {
        if let LocalShape::Gate(gate) = &mut self.shape {
            gate.footprint.reassign(&self.key, &key);
        }
        self.key = key;
        self.dirty = true;
    }

    pub fn summary(&self) -> EndpointSummary {
        let (kind, open) = match &self.shape {
            LocalShape::Gate(gate) => (EndpointKindTag::Gate, gate.is_open()),
            LocalShape::Volume(_) => (EndpointKindTag::Volume, false),
        };
        EndpointSummary {
            kind,
            zone: self.key.zone().to_string(),
            name: self.key.name().to_string(),
            direction: Some(self.direction()),
            hidden: self.policy.hidden,
            open,
        }
    }
}

/// Cached description of an endpoint hosted by a peer, rebuilt from roster
/// refreshes.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteEndpoint {
    key: EndpointKey,
    pub kind: EndpointKindTag,
    pub direction: Option<Direction>,
    pub hidden: bool,
    pub open: bool,
}

impl RemoteEndpoint {
    pub fn from_summary(server: &str, summary: &EndpointSummary) -> Self {
        Self {
            key: summary.key_on(server),
            kind: summary.kind,
            direction: summary.direction,
            hidden: summary.hidden,
            open: summary.open,
        }
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Name of the peer hosting this endpoint.
    pub fn server(&self) -> &str {
        self.key.server().unwrap_or_default()
    }

    pub(crate) fn set_key(&mut self, key: EndpointKey) {
        self.key = key;
    }
}

#[derive(Clone, Debug)]
pub enum Endpoint {
    Local(LocalEndpoint),
    Remote(RemoteEndpoint),
}

impl Endpoint {
    pub fn key(&self) -> &EndpointKey {
        match self {
            Endpoint::Local(local) => local.key(),
            Endpoint::Remote(remote) => remote.key(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Local(_))
    }

    pub fn as_local(&self) -> Option<&LocalEndpoint> {
        match self {
            Endpoint::Local(local) => Some(local),
            Endpoint::Remote(_) => None,
        }
    }

    pub fn as_local_mut(&mut self) -> Option<&mut LocalEndpoint> {
        match self {
            Endpoint::Local(local) => Some(local),
            Endpoint::Remote(_) => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteEndpoint> {
        match self {
            Endpoint::Remote(remote) => Some(remote),
            Endpoint::Local(_) => None,
        }
    }

    pub fn gate(&self) -> Option<&Gate> {
        self.as_local().and_then(LocalEndpoint::gate)
    }

    pub fn gate_mut(&mut self) -> Option<&mut Gate> {
        self.as_local_mut().and_then(LocalEndpoint::gate_mut)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Endpoint::Local(local) => Some(local.direction()),
            Endpoint::Remote(remote) => remote.direction,
        }
    }

    pub fn kind(&self) -> EndpointKindTag {
        match self {
            Endpoint::Local(local) => match local.shape {
                LocalShape::Gate(_) => EndpointKindTag::Gate,
                LocalShape::Volume(_) => EndpointKindTag::Volume,
            },
            Endpoint::Remote(remote) => remote.kind,
        }
    }
}
