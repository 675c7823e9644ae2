//! Socket abstraction for ICMP probing
//!
//! The probe loop only talks to a [`ProbeSocket`]. The production
//! implementation is [`icmp_v4::RawIcmpV4Socket`]; tests plug in their own.

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Instant;

pub mod icmp_v4;
pub mod utils;

pub use icmp_v4::RawIcmpV4Socket;

/// Error returned by `recv_from` once the deadline has passed
pub fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "receive deadline exceeded")
}

/// An ICMP endpoint with per-packet TTL control
///
/// Exactly one probe is in flight at a time, so a received reply is always
/// attributed to the probe sent just before it. No identifier or sequence
/// matching is performed.
#[async_trait]
pub trait ProbeSocket: Send + Sync {
    /// Set the IP TTL used for subsequent sends
    fn set_ttl(&self, ttl: u8) -> Result<()>;

    /// Set the absolute instant after which receives fail with a timeout
    fn set_deadline(&mut self, deadline: Instant);

    /// Send one datagram to `target`. No retry.
    fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> Result<()>;

    /// Wait for one datagram of at most `buf_size` bytes.
    ///
    /// Returns the ICMP message bytes and the sender address.
    async fn recv_from(&self, buf_size: usize) -> Result<(Vec<u8>, IpAddr)>;
}
