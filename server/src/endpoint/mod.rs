mod design;
mod endpoint;
mod footprint;
mod gate;
mod indices;
mod options;
mod policy;
mod registry;
mod volume;

pub use design::{DesignBlock, GateDesign};
pub use endpoint::{Endpoint, LocalEndpoint, LocalShape, RemoteEndpoint};
pub use footprint::{BlockFootprint, GateBlock};
pub use gate::{CloseContext, Gate, GateOptions};
pub use indices::RoleIndices;
pub use options::{GATE_OPTIONS, POLICY_OPTIONS};
pub use policy::{
    CostTable, EndpointPolicy, FilterOutcome, FilterTable, MessageTemplates, RouteTier, NOTHING,
    WILDCARD,
};
pub use registry::{is_valid_name, EndpointRegistry, RegistryEvent};
pub use volume::{SearchAxis, SpawnSearch, Volume};
