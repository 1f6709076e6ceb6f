//! OpenFlow 1.0 southbound model for the campus controller.
//!
//! This crate holds everything the controller needs to talk about switches
//! without knowing anything about campus policy:
//!
//! - [`types`]: datapath, port and buffer identifiers, ethertypes and IP
//!   protocol numbers
//! - [`packet`]: decoding of the header stack carried in a packet-in
//! - [`flow`]: flow-mod messages (`FlowMatch`, `FlowAction`, `FlowMod`)
//! - [`frame`]: Ethernet frame encoding for building test packet-ins
//! - [`error`]: packet decoding errors
//!
//! # Example
//!
//! ```ignore
//! use campus_openflow::{FlowMatch, FlowMod, Packet, PortNo};
//!
//! let packet = Packet::parse(&frame)?;
//! let flow = FlowMod::new(FlowMatch::from_packet(&packet, PortNo::new(2)))
//!     .with_timeouts(50, 50)
//!     .flood();
//! ```

pub mod error;
pub mod flow;
pub mod frame;
pub mod packet;
pub mod types;

pub use error::{PacketError, PacketResult};
pub use flow::{FlowAction, FlowMatch, FlowMod};
pub use frame::{FrameBuilder, Segment};
pub use packet::{
    ArpHeader, EthernetHeader, IcmpHeader, Ipv4Header, NetworkLayer, Packet, TcpHeader,
    Transport, UdpHeader, VlanTag,
};
pub use types::{BufferId, DatapathId, EtherType, IpProto, PortNo};
