//! hoptrace - a minimal sequential ICMP traceroute
//!
//! Sends ICMP Echo Requests with increasing TTL, one at a time, and reports
//! the router that answers each one until the destination replies.

pub mod dns;
pub mod packet;
pub mod probe;
pub mod signal;
pub mod socket;
pub mod traceroute;

// Re-export core types for library users
pub use dns::{HickoryResolver, HostResolver};
pub use probe::{Classification, Probe, ProbeResult};
pub use socket::{ProbeSocket, RawIcmpV4Socket};
pub use traceroute::{
    DeadlinePolicy, TraceOutcome, Traceroute, TracerouteConfig, TracerouteConfigBuilder,
    TracerouteError,
};
