use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use gatelink_shared::{BlockCoord, BlockRole, Direction, EndpointKey, Instant};

use crate::{
    endpoint::{
        is_valid_name, BlockFootprint, EndpointPolicy, Gate, GateBlock, GateOptions,
        LocalEndpoint, LocalShape, SpawnSearch, Volume,
    },
    error::RecordError,
};

/// Persisted form of a portal gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRecord {
    pub name: String,
    pub zone: String,
    pub direction: Direction,
    #[serde(default)]
    pub design: String,
    #[serde(default)]
    pub links: Vec<EndpointKey>,
    #[serde(default)]
    pub outgoing: Option<EndpointKey>,
    #[serde(default)]
    pub incoming: BTreeSet<EndpointKey>,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub options: GateOptions,
    #[serde(default)]
    pub policy: EndpointPolicy,
    pub blocks: Vec<GateBlock>,
}

/// Persisted form of a volume endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub name: String,
    pub zone: String,
    pub direction: Direction,
    pub corner_a: BlockCoord,
    pub corner_b: BlockCoord,
    #[serde(default)]
    pub spawn: SpawnSearch,
    #[serde(default)]
    pub policy: EndpointPolicy,
}

/// One persisted local endpoint, stored as a JSON object tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EndpointRecord {
    Gate(GateRecord),
    Volume(VolumeRecord),
}

impl EndpointRecord {
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        serde_json::from_str(text).map_err(|error| RecordError::Malformed {
            reason: error.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string_pretty(self).map_err(|error| RecordError::Malformed {
            reason: error.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            EndpointRecord::Gate(gate) => &gate.name,
            EndpointRecord::Volume(volume) => &volume.name,
        }
    }

    pub fn zone(&self) -> &str {
        match self {
            EndpointRecord::Gate(gate) => &gate.zone,
            EndpointRecord::Volume(volume) => &volume.zone,
        }
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey::local(self.zone(), self.name())
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if !is_valid_name(self.name()) {
            return Err(RecordError::InvalidName(self.name().to_string()));
        }
        if self.zone().is_empty() {
            return Err(RecordError::MissingField {
                name: self.name().to_string(),
                field: "zone",
            });
        }
        let EndpointRecord::Gate(gate) = self else {
            return Ok(());
        };
        let name = || gate.name.clone();
        if gate.blocks.is_empty() {
            return Err(RecordError::InvalidGeometry {
                name: name(),
                reason: "gate has no blocks",
            });
        }
        if !gate.blocks.iter().any(|block| block.roles.contains(BlockRole::Portal)) {
            return Err(RecordError::InvalidGeometry {
                name: name(),
                reason: "gate has no portal blocks",
            });
        }
        let mut coords = BTreeSet::new();
        if !gate.blocks.iter().all(|block| coords.insert(block.coord)) {
            return Err(RecordError::InvalidGeometry {
                name: name(),
                reason: "two blocks share a coordinate",
            });
        }
        let mut seen = BTreeSet::new();
        for link in gate.links.iter() {
            if !seen.insert(link) {
                return Err(RecordError::DuplicateLink {
                    name: name(),
                    link: link.clone(),
                });
            }
        }
        if let Some(outgoing) = gate.outgoing.as_ref() {
            if !gate.links.contains(outgoing) {
                return Err(RecordError::DanglingOutgoing {
                    name: name(),
                    outgoing: outgoing.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn from_endpoint(endpoint: &LocalEndpoint) -> Self {
        let key = endpoint.key();
        match &endpoint.shape {
            LocalShape::Gate(gate) => EndpointRecord::Gate(GateRecord {
                name: key.name().to_string(),
                zone: key.zone().to_string(),
                direction: gate.direction,
                design: gate.design.clone(),
                links: gate.links().to_vec(),
                outgoing: gate.outgoing().cloned(),
                incoming: gate.incoming().clone(),
                open: gate.is_open(),
                options: gate.options.clone(),
                policy: endpoint.policy.clone(),
                blocks: gate.footprint.blocks().to_vec(),
            }),
            LocalShape::Volume(volume) => EndpointRecord::Volume(VolumeRecord {
                name: key.name().to_string(),
                zone: key.zone().to_string(),
                direction: volume.direction,
                corner_a: volume.min(),
                corner_b: volume.max(),
                spawn: volume.spawn.clone(),
                policy: endpoint.policy.clone(),
            }),
        }
    }

    /// Validates the record and rebuilds the endpoint. Open gates come back
    /// open as of `now`; the caller re-registers their portal blocks.
    pub fn into_endpoint(self, now: Instant) -> Result<LocalEndpoint, RecordError> {
        self.validate()?;
        let key = self.key();
        let endpoint = match self {
            EndpointRecord::Gate(record) => {
                let footprint = BlockFootprint::new(&key, record.blocks);
                let mut gate = Gate::new(record.direction, record.design, record.options, footprint);
                gate.restore_state(record.links, record.outgoing, record.incoming, record.open, now);
                LocalEndpoint::new(key, record.policy, LocalShape::Gate(gate))
            }
            EndpointRecord::Volume(record) => {
                let mut volume = Volume::new(record.corner_a, record.corner_b, record.direction);
                volume.spawn = record.spawn;
                LocalEndpoint::new(key, record.policy, LocalShape::Volume(volume))
            }
        };
        Ok(endpoint)
    }
}
