//! # DASH Flow Construction
//!
//! Typed descriptions of the VXLAN traffic the harness sends through the DPU,
//! and the generator interface that sends it.
//!
//! ### Key Submodules:
//! - `pattern`: fixed and incrementing header field values
//! - `headers`: the fixed `Eth/IPv4/UDP/VXLAN/Eth/IPv4/UDP` stack
//! - `flow`: `FlowSpec` and its validating `FlowBuilder`
//! - `template`: builders preloaded from `HarnessConfig`
//! - `protocol`: emulated devices and BGP peers on generator ports
//! - `generator`: the `TrafficGenerator` collaborator trait

pub mod error;
pub mod flow;
pub mod generator;
pub mod headers;
pub mod pattern;
pub mod protocol;
pub mod template;

pub use error::{FlowError, TrafficError};
pub use flow::{FlowBuilder, FlowSpec};
pub use generator::{
    BgpPeerMetrics, FlowCounters, GeneratorConfig, SessionState, TrafficGenerator, TransmitState,
};
pub use headers::{
    EthernetHeader, HeaderKind, HeaderStack, Ipv4Header, UdpHeader, VxlanHeader, MIN_FRAME_LEN,
};
pub use pattern::FieldPattern;
pub use protocol::{BgpPeer, BgpPeerType, ProtocolDevice, RouteRange};
pub use template::VxlanFlowTemplate;
