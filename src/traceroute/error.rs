//! Error types for traceroute operations
//!
//! Everything here is fatal to the run. Per-hop failures never surface as a
//! `TracerouteError`; they are recorded in the hop's
//! [`Classification`](crate::probe::Classification) instead.

use crate::packet::PacketError;
use thiserror::Error;

/// Errors that abort a traceroute run
#[derive(Debug, Error)]
pub enum TracerouteError {
    /// Socket creation failed due to insufficient permissions
    ///
    /// Raw ICMP sockets need elevated privileges on every supported platform.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Description of required permissions (e.g., "root or CAP_NET_RAW")
        required: String,
        /// Suggested remedy
        suggestion: String,
    },

    /// Socket creation failed for other reasons
    #[error("Failed to create socket: {0}")]
    SocketError(String),

    /// DNS resolution failed
    #[error("Failed to resolve host: {0}")]
    ResolutionError(String),

    /// IPv6 targets are not supported
    #[error("IPv6 targets are not supported")]
    Ipv6NotSupported,

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The Echo Request could not be serialized
    #[error("Failed to encode ICMP message: {0}")]
    ProbeEncode(#[from] PacketError),

    /// Writing result lines failed
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
