pub mod cluster;
pub mod designs;
pub mod logging;

pub use cluster::{address, TestCluster, TestNode};
pub use designs::{build_doorway, doorway, origin, place_doorway, portal, spawn_block, DOORWAY};
pub use logging::init_logging;
