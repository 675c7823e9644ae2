//! Forward and reverse DNS lookups

use crate::traceroute::TracerouteError;
use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Error type for reverse DNS operations
#[derive(Debug, thiserror::Error)]
pub enum ReverseDnsError {
    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    ResolutionError(String),

    /// No PTR record found
    #[error("No PTR record found")]
    NotFound,
}

/// A resolved traceroute destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Name as given by the user
    pub name: String,
    /// Resolved address
    pub addr: Ipv4Addr,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.addr)
    }
}

/// Resolver collaborator consumed by the traceroute
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve a hostname or IP literal to an IPv4 address
    async fn resolve(&self, host: &str) -> Result<Ipv4Addr, TracerouteError>;

    /// Return the first PTR name for `addr`
    async fn reverse_lookup(&self, addr: IpAddr) -> Result<String, ReverseDnsError>;
}

/// Resolve `host` into a [`Destination`]
pub async fn resolve_destination(
    resolver: &dyn HostResolver,
    host: &str,
) -> Result<Destination, TracerouteError> {
    let addr = resolver.resolve(host).await?;
    Ok(Destination {
        name: host.to_string(),
        addr,
    })
}

/// [`HostResolver`] backed by hickory-resolver
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Build a resolver from the system configuration, falling back to Cloudflare
    pub fn new() -> Self {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                warn!("system resolver configuration unavailable ({}), using Cloudflare", e);
                TokioResolver::builder_with_config(
                    ResolverConfig::cloudflare(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        };
        Self { resolver }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept IPv4 literals, reject IPv6 literals, defer anything else to DNS
fn parse_literal(host: &str) -> Option<Result<Ipv4Addr, TracerouteError>> {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Some(Ok(v4)),
        Ok(IpAddr::V6(_)) => Some(Err(TracerouteError::Ipv6NotSupported)),
        Err(_) => None,
    }
}

#[async_trait]
impl HostResolver for HickoryResolver {
    async fn resolve(&self, host: &str) -> Result<Ipv4Addr, TracerouteError> {
        if let Some(literal) = parse_literal(host) {
            return literal;
        }

        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| TracerouteError::ResolutionError(format!("{}: {}", host, e)))?;

        let mut saw_v6 = false;
        for ip in lookup.iter() {
            match ip {
                IpAddr::V4(v4) => {
                    debug!("resolved {} to {}", host, v4);
                    return Ok(v4);
                }
                IpAddr::V6(_) => saw_v6 = true,
            }
        }

        if saw_v6 {
            Err(TracerouteError::Ipv6NotSupported)
        } else {
            Err(TracerouteError::ResolutionError(format!(
                "{}: no addresses found",
                host
            )))
        }
    }

    async fn reverse_lookup(&self, addr: IpAddr) -> Result<String, ReverseDnsError> {
        let lookup = self
            .resolver
            .reverse_lookup(addr)
            .await
            .map_err(|e| ReverseDnsError::ResolutionError(e.to_string()))?;

        // Get the first PTR record
        lookup
            .iter()
            .next()
            .map(|name| {
                let name_str = name.to_string();
                match name_str.strip_suffix('.') {
                    Some(trimmed) => trimmed.to_string(),
                    None => name_str,
                }
            })
            .ok_or(ReverseDnsError::NotFound)
    }
}
