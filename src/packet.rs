//! ICMPv4 wire format helpers
//!
//! Encoding is limited to Echo Request, the only message the probe loop sends.
//! Parsing accepts any ICMPv4 message and exposes its type, code and, for echo
//! messages, the identifier/sequence pair.

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use thiserror::Error;

/// ICMP header length shared by every message type
pub const ICMP_HEADER_LEN_BYTES: usize = 8;

/// Errors raised while encoding or decoding ICMP messages
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The output buffer could not hold the message being built
    #[error("buffer too small for ICMP echo request")]
    BufferTooSmall,

    /// Received bytes are shorter than an ICMP header
    #[error("message too short: {len} bytes")]
    MessageTooShort {
        /// Number of bytes that were available
        len: usize,
    },
}

/// Identifier and sequence carried by Echo Request/Reply messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoFields {
    /// Echo identifier
    pub identifier: u16,
    /// Echo sequence number
    pub sequence: u16,
}

/// A parsed ICMPv4 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpMessage {
    /// Message type
    pub icmp_type: IcmpType,
    /// Message code
    pub code: IcmpCode,
    /// Echo fields, present only for Echo Request and Echo Reply
    pub echo: Option<EchoFields>,
}

/// Build an ICMP Echo Request with a valid checksum.
pub fn encode_echo_request(
    identifier: u16,
    sequence: u16,
    payload: &[u8],
) -> Result<Vec<u8>, PacketError> {
    let mut buf = vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut echo_req_packet =
        MutableEchoRequestPacket::new(&mut buf).ok_or(PacketError::BufferTooSmall)?;

    echo_req_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_req_packet.set_icmp_code(IcmpCode(0));
    echo_req_packet.set_identifier(identifier);
    echo_req_packet.set_sequence_number(sequence);
    echo_req_packet.set_payload(payload);

    let checksum = pnet_checksum(echo_req_packet.packet(), 1);
    echo_req_packet.set_checksum(checksum);

    Ok(buf)
}

/// Parse an ICMPv4 message (IP header already removed).
///
/// The checksum is not verified and no identifier matching is done here;
/// classification is purely by type.
pub fn parse_message(data: &[u8]) -> Result<IcmpMessage, PacketError> {
    let icmp_packet = IcmpPacket::new(data).ok_or(PacketError::MessageTooShort { len: data.len() })?;
    let icmp_type = icmp_packet.get_icmp_type();

    let echo = match icmp_type {
        IcmpTypes::EchoReply => EchoReplyPacket::new(data).map(|p| EchoFields {
            identifier: p.get_identifier(),
            sequence: p.get_sequence_number(),
        }),
        IcmpTypes::EchoRequest => EchoRequestPacket::new(data).map(|p| EchoFields {
            identifier: p.get_identifier(),
            sequence: p.get_sequence_number(),
        }),
        _ => None,
    };

    Ok(IcmpMessage {
        icmp_type,
        code: icmp_packet.get_icmp_code(),
        echo,
    })
}

/// Human-readable name for an ICMPv4 message type
pub fn icmp_type_name(icmp_type: IcmpType) -> String {
    let name = match icmp_type {
        IcmpTypes::EchoReply => "echo reply",
        IcmpTypes::DestinationUnreachable => "destination unreachable",
        IcmpTypes::SourceQuench => "source quench",
        IcmpTypes::RedirectMessage => "redirect",
        IcmpTypes::EchoRequest => "echo",
        IcmpTypes::RouterAdvertisement => "router advertisement",
        IcmpTypes::RouterSolicitation => "router solicitation",
        IcmpTypes::TimeExceeded => "time exceeded",
        IcmpTypes::ParameterProblem => "parameter problem",
        IcmpTypes::Timestamp => "timestamp",
        IcmpTypes::TimestampReply => "timestamp reply",
        IcmpType(other) => return format!("type {}", other),
    };
    name.to_string()
}
