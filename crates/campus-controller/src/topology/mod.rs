//! Campus topology: which neighbor sits behind each switch port.
//!
//! The map is built and validated once at startup and is read-only
//! afterwards.

mod map;
mod types;

pub use map::{SwitchNode, TopologyMap};
pub use types::{NeighborKey, SwitchKind};
