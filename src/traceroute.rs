//! Core traceroute functionality

pub mod api;
pub mod config;
pub mod engine;
pub mod error;

// Re-export commonly used types
pub use api::{arm_deadline, open_socket, Traceroute};
pub use config::{
    DeadlinePolicy, TracerouteConfig, TracerouteConfigBuilder, DEFAULT_MAX_HOPS,
    DEFAULT_RECV_BUFFER_SIZE, DEFAULT_TIMEOUT,
};
pub use engine::{TraceOutcome, TracerouteEngine};
pub use error::TracerouteError;
