use dash_core::AddrError;
use thiserror::Error;

/// A flow description that cannot be sent as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("flow name must not be empty")]
    EmptyName,

    #[error("flow '{name}' has no {which} port")]
    MissingPort { name: String, which: &'static str },

    #[error("flow '{name}' transmits and receives on the same port '{port}'")]
    SamePort { name: String, port: String },

    #[error("flow '{name}': packet size {size} is below the {min}-byte encapsulated minimum")]
    PacketTooSmall { name: String, size: u32, min: u32 },

    #[error("flow '{name}': VNI {vni} does not fit in 24 bits")]
    VniTooWide { name: String, vni: u32 },

    #[error("flow '{name}' has a rate of 0 packets per second")]
    ZeroRate { name: String },

    #[error("flow '{name}': {field} increment has a count of 0")]
    EmptyPattern { name: String, field: &'static str },

    #[error("flow '{name}': {field} pattern is out of range: {source}")]
    Pattern {
        name: String,
        field: &'static str,
        #[source]
        source: AddrError,
    },

    #[error("protocol device '{name}': {reason}")]
    InvalidDevice { name: String, reason: String },
}

/// Failure reported by a traffic generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrafficError {
    #[error("traffic generator unavailable: {0}")]
    Unavailable(String),

    #[error("traffic generator has no flow named '{0}'")]
    UnknownFlow(String),

    #[error("traffic generator rejected the request: {0}")]
    Rejected(String),
}
