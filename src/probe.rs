//! Probe and per-hop result types
//!
//! A [`Probe`] is built and consumed inside a single loop iteration. The
//! matching [`ProbeResult`] is rendered to one output line straight away and
//! never stored.

use crate::packet::{encode_echo_request, icmp_type_name, PacketError};
use pnet::packet::icmp::IcmpType;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// ICMP identifier derived from the process id
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xffff) as u16
}

/// One outbound Echo Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Time-to-live the probe is sent with
    pub ttl: u8,
    /// Echo identifier, constant for the whole run
    pub identifier: u16,
    /// Echo sequence number, always equal to `ttl`
    pub sequence: u16,
}

impl Probe {
    /// Create the probe for a given TTL
    pub fn new(ttl: u8, identifier: u16) -> Self {
        Self {
            ttl,
            identifier,
            sequence: u16::from(ttl),
        }
    }

    /// Serialize to wire bytes (empty payload)
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        encode_echo_request(self.identifier, self.sequence, &[])
    }
}

/// How the reply (or failure) for one probe was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Time Exceeded from a router on the path
    IntermediateHop,
    /// Echo Reply, the destination answered
    Destination,
    /// Any other ICMP message type
    UnexpectedType(IcmpType),
    /// The probe could not be sent
    SendError(String),
    /// Nothing usable was received before the deadline
    ReceiveError(String),
    /// The reply could not be decoded
    ParseError(String),
}

/// Outcome of a single TTL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// TTL that was probed
    pub ttl: u8,
    /// Address of whoever answered
    pub responder: Option<IpAddr>,
    /// Round-trip time
    pub rtt: Option<Duration>,
    /// Display name for the destination line
    pub hostname: Option<String>,
    /// Reply classification
    pub classification: Classification,
}

impl ProbeResult {
    /// A result for which no reply was obtained
    pub fn failed(ttl: u8, classification: Classification) -> Self {
        Self {
            ttl,
            responder: None,
            rtt: None,
            hostname: None,
            classification,
        }
    }

    /// A result for a received and classified reply
    pub fn replied(
        ttl: u8,
        responder: IpAddr,
        rtt: Duration,
        classification: Classification,
    ) -> Self {
        Self {
            ttl,
            responder: Some(responder),
            rtt: Some(rtt),
            hostname: None,
            classification,
        }
    }

    /// Whether this result ends the run
    pub fn is_destination(&self) -> bool {
        self.classification == Classification::Destination
    }
}

struct Endpoint<'a>(Option<&'a str>, Option<IpAddr>);

impl fmt::Display for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0, self.1) {
            (Some(name), _) => f.write_str(name),
            (None, Some(addr)) => write!(f, "{}", addr),
            (None, None) => f.write_str("*"),
        }
    }
}

struct Rtt(Option<Duration>);

impl fmt::Display for Rtt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rtt) => write!(f, "{:?}", rtt),
            None => f.write_str("*"),
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ttl = self.ttl;
        match &self.classification {
            Classification::IntermediateHop => {
                write!(f, "{}: {} {}", ttl, Endpoint(None, self.responder), Rtt(self.rtt))
            }
            Classification::Destination => write!(
                f,
                "{}: {} {}",
                ttl,
                Endpoint(self.hostname.as_deref(), self.responder),
                Rtt(self.rtt)
            ),
            Classification::UnexpectedType(icmp_type) => write!(
                f,
                "{}: Unexpected ICMP message type: {}",
                ttl,
                icmp_type_name(*icmp_type)
            ),
            Classification::SendError(e) => write!(f, "{}: Error sending ICMP message: {}", ttl, e),
            Classification::ReceiveError(e) => {
                write!(f, "{}: Error receiving ICMP reply: {}", ttl, e)
            }
            Classification::ParseError(e) => write!(f, "{}: Error parsing ICMP reply: {}", ttl, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::IcmpTypes;
    use std::net::Ipv4Addr;

    #[test]
    fn test_probe_sequence_tracks_ttl() {
        for ttl in 1..=64u8 {
            let probe = Probe::new(ttl, 777);
            assert_eq!(probe.sequence, u16::from(ttl));
            assert_eq!(probe.identifier, 777);
        }
    }

    #[test]
    fn test_probe_encode_carries_fields() {
        let bytes = Probe::new(9, 0xbeef).encode().unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 0xbeef);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 9);
    }

    #[test]
    fn test_intermediate_hop_line() {
        let result = ProbeResult::replied(
            3,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            Duration::from_micros(12_345),
            Classification::IntermediateHop,
        );
        assert_eq!(result.to_string(), "3: 10.0.0.1 12.345ms");
        assert!(!result.is_destination());
    }

    #[test]
    fn test_destination_line_prefers_hostname() {
        let mut result = ProbeResult::replied(
            7,
            IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
            Duration::from_millis(20),
            Classification::Destination,
        );
        assert_eq!(result.to_string(), "7: 93.184.216.34 20ms");

        result.hostname = Some("example.com".to_string());
        assert_eq!(result.to_string(), "7: example.com 20ms");
        assert!(result.is_destination());
    }

    #[test]
    fn test_diagnostic_lines() {
        let unexpected = ProbeResult::replied(
            2,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            Duration::from_millis(1),
            Classification::UnexpectedType(IcmpTypes::DestinationUnreachable),
        );
        assert_eq!(
            unexpected.to_string(),
            "2: Unexpected ICMP message type: destination unreachable"
        );

        let recv = ProbeResult::failed(4, Classification::ReceiveError("timed out".into()));
        assert_eq!(recv.to_string(), "4: Error receiving ICMP reply: timed out");

        let send = ProbeResult::failed(5, Classification::SendError("no route".into()));
        assert_eq!(send.to_string(), "5: Error sending ICMP message: no route");

        let parse = ProbeResult::failed(6, Classification::ParseError("short".into()));
        assert_eq!(parse.to_string(), "6: Error parsing ICMP reply: short");
    }
}
