//! Configuration types for traceroute operations

use super::TracerouteError;
use crate::probe::process_identifier;
use std::time::Duration;

/// Default hop limit
pub const DEFAULT_MAX_HOPS: u8 = 64;
/// Default receive deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default receive buffer size in bytes
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1500;
/// Smallest buffer that can hold an ICMP header
const MIN_RECV_BUFFER_SIZE: usize = crate::packet::ICMP_HEADER_LEN_BYTES;

/// When the receive deadline is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlinePolicy {
    /// Armed once when the socket is opened; later hops get whatever time is left
    #[default]
    Shared,
    /// Re-armed before every probe
    PerProbe,
}

/// Configuration for a traceroute operation
#[derive(Debug, Clone)]
pub struct TracerouteConfig {
    /// Maximum number of hops (default: 64)
    pub max_hops: u8,
    /// Receive deadline measured from when it is armed (default: 2s)
    pub timeout: Duration,
    /// Receive buffer size (default: 1500 bytes)
    pub recv_buffer_size: usize,
    /// Deadline arming policy (default: shared)
    pub deadline_policy: DeadlinePolicy,
    /// ICMP echo identifier (default: process id)
    pub identifier: u16,
}

impl Default for TracerouteConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            timeout: DEFAULT_TIMEOUT,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            deadline_policy: DeadlinePolicy::Shared,
            identifier: process_identifier(),
        }
    }
}

impl TracerouteConfig {
    /// Create a new TracerouteConfig builder
    pub fn builder() -> TracerouteConfigBuilder {
        TracerouteConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TracerouteError> {
        if self.max_hops < 1 {
            return Err(TracerouteError::ConfigError(
                "max_hops must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(TracerouteError::ConfigError(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.recv_buffer_size < MIN_RECV_BUFFER_SIZE {
            return Err(TracerouteError::ConfigError(format!(
                "recv_buffer_size must be at least {} bytes",
                MIN_RECV_BUFFER_SIZE
            )));
        }
        Ok(())
    }
}

/// Builder for TracerouteConfig
pub struct TracerouteConfigBuilder {
    config: TracerouteConfig,
}

impl TracerouteConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: TracerouteConfig::default(),
        }
    }

    /// Set the maximum number of hops
    pub fn max_hops(mut self, hops: u8) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// Set the receive deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the receive buffer size
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Set the deadline policy
    pub fn deadline_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.config.deadline_policy = policy;
        self
    }

    /// Override the ICMP echo identifier
    pub fn identifier(mut self, identifier: u16) -> Self {
        self.config.identifier = identifier;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TracerouteConfig, TracerouteError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TracerouteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
