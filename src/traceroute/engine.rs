//! The hop-discovery probe loop
//!
//! One Echo Request per TTL, strictly sequential: set TTL, send, wait for one
//! reply, classify it, print a line, then decide whether to go on. Only
//! serialization failures and output errors abort the run; every network
//! failure is confined to the hop it happened on.

use super::config::{DeadlinePolicy, TracerouteConfig};
use super::TracerouteError;
use crate::dns::resolver::{Destination, HostResolver};
use crate::packet::parse_message;
use crate::probe::{Classification, Probe, ProbeResult};
use crate::socket::ProbeSocket;
use pnet::packet::icmp::IcmpTypes;
use std::fmt;
use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why the probe loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    /// An Echo Reply arrived for `ttl`
    DestinationReached {
        /// TTL of the final hop
        ttl: u8,
    },
    /// An interrupt was observed after probing `ttl`
    Interrupted {
        /// Last TTL that was probed
        ttl: u8,
    },
    /// Every TTL up to the hop limit was probed without an Echo Reply
    HopLimitExceeded,
}

impl TraceOutcome {
    /// Notice printed when the run ends, if any
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            TraceOutcome::DestinationReached { .. } => None,
            TraceOutcome::Interrupted { .. } => Some("Traceroute interrupted."),
            TraceOutcome::HopLimitExceeded => Some("Max hops reached."),
        }
    }
}

impl fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceOutcome::DestinationReached { ttl } => {
                write!(f, "destination reached at hop {}", ttl)
            }
            TraceOutcome::Interrupted { ttl } => write!(f, "interrupted after hop {}", ttl),
            TraceOutcome::HopLimitExceeded => f.write_str("hop limit exceeded"),
        }
    }
}

/// Drives the probe loop over a single socket
pub struct TracerouteEngine {
    config: TracerouteConfig,
    destination: Destination,
    socket: Box<dyn ProbeSocket>,
    resolver: Arc<dyn HostResolver>,
    interrupt: CancellationToken,
}

impl TracerouteEngine {
    /// Create an engine that owns `socket` for the duration of the run
    pub fn new(
        config: TracerouteConfig,
        destination: Destination,
        socket: Box<dyn ProbeSocket>,
        resolver: Arc<dyn HostResolver>,
        interrupt: CancellationToken,
    ) -> Result<Self, TracerouteError> {
        config.validate()?;
        Ok(Self {
            config,
            destination,
            socket,
            resolver,
            interrupt,
        })
    }

    /// Run the loop, writing one line per hop to `out`.
    ///
    /// Consumes the engine so the socket is closed when the run ends,
    /// whichever way it ends.
    pub async fn run<W: Write>(mut self, out: &mut W) -> Result<TraceOutcome, TracerouteError> {
        info!(
            "tracing {} with up to {} hops",
            self.destination, self.config.max_hops
        );

        let outcome = self.probe_loop(out).await?;
        if let Some(notice) = outcome.notice() {
            writeln!(out, "{}", notice)?;
        }
        out.flush()?;

        info!("trace finished: {}", outcome);
        Ok(outcome)
    }

    async fn probe_loop<W: Write>(&mut self, out: &mut W) -> Result<TraceOutcome, TracerouteError> {
        for ttl in 1..=self.config.max_hops {
            let result = self.probe_hop(ttl).await?;
            writeln!(out, "{}", result)?;
            out.flush()?;

            if result.is_destination() {
                return Ok(TraceOutcome::DestinationReached { ttl });
            }
            if self.interrupt.is_cancelled() {
                return Ok(TraceOutcome::Interrupted { ttl });
            }
        }
        Ok(TraceOutcome::HopLimitExceeded)
    }

    /// Send one probe and classify whatever comes back
    async fn probe_hop(&mut self, ttl: u8) -> Result<ProbeResult, TracerouteError> {
        if let Err(e) = self.socket.set_ttl(ttl) {
            debug!(ttl, "set_ttl failed: {:#}", e);
            return Ok(ProbeResult::failed(
                ttl,
                Classification::SendError(format!("{:#}", e)),
            ));
        }

        let probe = Probe::new(ttl, self.config.identifier);
        let packet = probe.encode()?;

        if self.config.deadline_policy == DeadlinePolicy::PerProbe {
            self.socket.set_deadline(Instant::now() + self.config.timeout);
        }

        let start = Instant::now();
        if let Err(e) = self.socket.send_to(&packet, self.destination.addr) {
            debug!(ttl, "send failed: {:#}", e);
            return Ok(ProbeResult::failed(
                ttl,
                Classification::SendError(format!("{:#}", e)),
            ));
        }
        debug!(ttl, sequence = probe.sequence, "probe sent");

        let (reply, from_addr) = match self.socket.recv_from(self.config.recv_buffer_size).await {
            Ok(received) => received,
            Err(e) => {
                debug!(ttl, "receive failed: {:#}", e);
                return Ok(ProbeResult::failed(
                    ttl,
                    Classification::ReceiveError(format!("{:#}", e)),
                ));
            }
        };
        let rtt = start.elapsed();

        let message = match parse_message(&reply) {
            Ok(message) => message,
            Err(e) => {
                debug!(ttl, "unparseable reply from {}: {}", from_addr, e);
                return Ok(ProbeResult::failed(
                    ttl,
                    Classification::ParseError(e.to_string()),
                ));
            }
        };
        debug!(ttl, from = %from_addr, icmp_type = message.icmp_type.0, "reply received");

        let result = match message.icmp_type {
            IcmpTypes::TimeExceeded => {
                ProbeResult::replied(ttl, from_addr, rtt, Classification::IntermediateHop)
            }
            IcmpTypes::EchoReply => {
                let mut result =
                    ProbeResult::replied(ttl, from_addr, rtt, Classification::Destination);
                result.hostname = Some(self.destination_display_name().await);
                result
            }
            other => {
                ProbeResult::replied(ttl, from_addr, rtt, Classification::UnexpectedType(other))
            }
        };
        Ok(result)
    }

    /// Reverse-resolve the destination, falling back to the literal address
    async fn destination_display_name(&self) -> String {
        let addr = IpAddr::V4(self.destination.addr);
        match self.resolver.reverse_lookup(addr).await {
            Ok(name) => name,
            Err(e) => {
                debug!("reverse lookup of {} failed: {}", addr, e);
                addr.to_string()
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
