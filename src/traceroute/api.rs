//! High-level traceroute API

use crate::dns::resolver::{Destination, HostResolver};
use crate::socket::{ProbeSocket, RawIcmpV4Socket};
use crate::traceroute::{
    DeadlinePolicy, TraceOutcome, TracerouteConfig, TracerouteEngine, TracerouteError,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A traceroute ready to run against a resolved destination
///
/// # Examples
///
/// ```no_run
/// use hoptrace::dns::{HickoryResolver, HostResolver};
/// use hoptrace::dns::resolver::resolve_destination;
/// use hoptrace::{Traceroute, TracerouteConfig};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver: Arc<dyn HostResolver> = Arc::new(HickoryResolver::new());
/// let destination = resolve_destination(resolver.as_ref(), "example.com").await?;
/// let config = TracerouteConfig::builder().max_hops(20).build()?;
///
/// let traceroute = Traceroute::new(config, destination, resolver, CancellationToken::new())?;
/// let outcome = traceroute.run(&mut std::io::stdout()).await?;
/// println!("{}", outcome);
/// # Ok(())
/// # }
/// ```
pub struct Traceroute {
    engine: TracerouteEngine,
}

impl Traceroute {
    /// Open a raw ICMP socket and prepare the probe loop
    ///
    /// # Errors
    ///
    /// * `TracerouteError::InsufficientPermissions` - raw sockets need root or CAP_NET_RAW
    /// * `TracerouteError::SocketError` - any other socket failure
    /// * `TracerouteError::ConfigError` - invalid configuration
    pub fn new(
        config: TracerouteConfig,
        destination: Destination,
        resolver: Arc<dyn HostResolver>,
        interrupt: CancellationToken,
    ) -> Result<Self, TracerouteError> {
        config.validate()?;
        let socket = open_socket(&config)?;
        Self::with_socket(config, destination, socket, resolver, interrupt)
    }

    /// Create a traceroute over a caller-provided socket
    pub fn with_socket(
        config: TracerouteConfig,
        destination: Destination,
        socket: Box<dyn ProbeSocket>,
        resolver: Arc<dyn HostResolver>,
        interrupt: CancellationToken,
    ) -> Result<Self, TracerouteError> {
        let engine = TracerouteEngine::new(config, destination, socket, resolver, interrupt)?;
        Ok(Self { engine })
    }

    /// Run until the destination answers, the hop limit is hit, or an interrupt is observed
    pub async fn run<W: Write>(self, out: &mut W) -> Result<TraceOutcome, TracerouteError> {
        self.engine.run(out).await
    }
}

/// Open the raw socket and, under the shared policy, arm the run-wide deadline
pub fn open_socket(config: &TracerouteConfig) -> Result<Box<dyn ProbeSocket>, TracerouteError> {
    let mut socket = RawIcmpV4Socket::open()?;
    arm_deadline(&mut socket, config);
    Ok(Box::new(socket))
}

/// Arm the run-wide receive deadline on a freshly opened socket.
///
/// Does nothing under [`DeadlinePolicy::PerProbe`]; the engine arms it before each send.
pub fn arm_deadline(socket: &mut dyn ProbeSocket, config: &TracerouteConfig) {
    if config.deadline_policy == DeadlinePolicy::Shared {
        socket.set_deadline(Instant::now() + config.timeout);
    }
}
