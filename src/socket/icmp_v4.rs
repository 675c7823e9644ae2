//! Raw IPv4 ICMP socket

use super::{deadline_exceeded, utils, ProbeSocket};
use crate::traceroute::TracerouteError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pnet::packet::ipv4::Ipv4Packet;
use socket2::{Domain, Protocol, Socket as Socket2, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;

/// Smallest read timeout handed to the kernel; a zero `SO_RCVTIMEO` blocks forever
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Raw ICMP socket bound to all local IPv4 addresses
///
/// The OS socket is closed when this value is dropped.
pub struct RawIcmpV4Socket {
    socket: Arc<Socket2>,
    deadline: Option<Instant>,
}

impl RawIcmpV4Socket {
    /// Open a raw ICMP socket and bind it to `0.0.0.0`
    pub fn open() -> Result<Self, TracerouteError> {
        let socket = Socket2::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(map_open_error)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TracerouteError::SocketError(format!("bind to {}: {}", bind_addr, e)))?;

        debug!("opened raw ICMP socket on {}", bind_addr);
        Ok(Self {
            socket: Arc::new(socket),
            deadline: None,
        })
    }
}

/// Translate a socket creation failure into the run's fatal error
pub(crate) fn map_open_error(err: io::Error) -> TracerouteError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        let suggestion = if utils::is_root() {
            "Check that raw sockets are not blocked by a security policy".to_string()
        } else {
            let args = std::env::args().collect::<Vec<_>>().join(" ");
            format!("Run with sudo: sudo {}", args)
        };
        TracerouteError::InsufficientPermissions {
            required: "root or CAP_NET_RAW".to_string(),
            suggestion,
        }
    } else {
        TracerouteError::SocketError(err.to_string())
    }
}

/// Read timeout for a receive started at `now`, or `None` once `deadline` has passed.
///
/// Never returns a duration that rounds down to a zero `timeval`.
pub(crate) fn read_timeout_until(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() {
        None
    } else {
        Some(remaining.max(MIN_READ_TIMEOUT))
    }
}

/// Strip the IPv4 header that raw sockets deliver in front of the ICMP message.
///
/// Data that does not look like an IPv4 packet is returned unchanged.
pub(crate) fn strip_ipv4_header(data: Vec<u8>) -> Vec<u8> {
    let header_len = match Ipv4Packet::new(&data) {
        Some(packet) if packet.get_version() == 4 => packet.get_header_length() as usize * 4,
        _ => return data,
    };
    if header_len < IPV4_HEADER_MIN_LEN_BYTES || header_len > data.len() {
        return data;
    }
    data[header_len..].to_vec()
}

#[async_trait]
impl ProbeSocket for RawIcmpV4Socket {
    fn set_ttl(&self, ttl: u8) -> Result<()> {
        self.socket
            .set_ttl_v4(u32::from(ttl))
            .context("Failed to set TTL")?;
        Ok(())
    }

    fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> Result<()> {
        let target_addr = SocketAddr::V4(SocketAddrV4::new(target, 0));
        self.socket
            .send_to(packet, &target_addr.into())
            .context("Failed to send ICMP packet")?;
        Ok(())
    }

    async fn recv_from(&self, buf_size: usize) -> Result<(Vec<u8>, IpAddr)> {
        let remaining = match self.deadline {
            Some(deadline) => match read_timeout_until(deadline, Instant::now()) {
                Some(timeout) => Some(timeout),
                None => return Err(deadline_exceeded().into()),
            },
            None => None,
        };

        let socket = Arc::clone(&self.socket);
        tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, IpAddr)> {
            socket.set_read_timeout(remaining)?;

            let mut recv_buf = vec![MaybeUninit::<u8>::uninit(); buf_size];
            let (size, socket_addr) = socket.recv_from(&mut recv_buf).map_err(|e| {
                match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => deadline_exceeded(),
                    _ => e,
                }
            })?;

            let from_addr = socket_addr
                .as_socket_ipv4()
                .map(|s| IpAddr::V4(*s.ip()))
                .ok_or_else(|| anyhow!("reply from non-IPv4 address"))?;

            // SAFETY: recv_from initialized the first `size` bytes, and
            // MaybeUninit<u8> has the same layout as u8
            let initialized_part: &[MaybeUninit<u8>] = &recv_buf[..size];
            let packet_data: &[u8] =
                unsafe { &*(initialized_part as *const [MaybeUninit<u8>] as *const [u8]) };

            trace!("received {} bytes from {}", size, from_addr);
            Ok((strip_ipv4_header(packet_data.to_vec()), from_addr))
        })
        .await
        .context("receive task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::ipv4::MutableIpv4Packet;

    fn ipv4_wrapped(icmp: &[u8], header_words: u8) -> Vec<u8> {
        let header_len = header_words as usize * 4;
        let mut buf = vec![0u8; header_len + icmp.len()];
        {
            let mut packet = MutableIpv4Packet::new(&mut buf).unwrap();
            packet.set_version(4);
            packet.set_header_length(header_words);
            packet.set_total_length((header_len + icmp.len()) as u16);
            packet.set_ttl(64);
            packet.set_source(Ipv4Addr::new(10, 0, 0, 1));
            packet.set_destination(Ipv4Addr::new(10, 0, 0, 2));
        }
        buf[header_len..].copy_from_slice(icmp);
        buf
    }

    #[test]
    fn test_strip_plain_header() {
        let icmp = [11u8, 0, 0xf4, 0xff, 0, 0, 0, 0];
        let stripped = strip_ipv4_header(ipv4_wrapped(&icmp, 5));
        assert_eq!(stripped, icmp.to_vec());
    }

    #[test]
    fn test_strip_header_with_options() {
        let icmp = [0u8, 0, 0, 0, 0, 1, 0, 1];
        let stripped = strip_ipv4_header(ipv4_wrapped(&icmp, 6));
        assert_eq!(stripped, icmp.to_vec());
    }

    #[test]
    fn test_strip_leaves_bare_icmp_alone() {
        let icmp = vec![0u8, 0, 0, 0, 0, 1, 0, 1];
        assert_eq!(strip_ipv4_header(icmp.clone()), icmp);

        let short = vec![0x45, 0];
        assert_eq!(strip_ipv4_header(short.clone()), short);
    }

    #[test]
    fn test_permission_error_mapping() {
        let err = map_open_error(io::Error::from(io::ErrorKind::PermissionDenied));
        match err {
            TracerouteError::InsufficientPermissions { required, .. } => {
                assert!(required.contains("CAP_NET_RAW"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = map_open_error(io::Error::from(io::ErrorKind::AddrNotAvailable));
        assert!(matches!(err, TracerouteError::SocketError(_)));
    }

    #[test]
    fn test_read_timeout_never_rounds_to_zero() {
        let now = Instant::now();
        assert_eq!(read_timeout_until(now, now), None);
        assert_eq!(read_timeout_until(now, now + Duration::from_millis(5)), None);

        let sub_micro = read_timeout_until(now + Duration::from_nanos(300), now).unwrap();
        assert_eq!(sub_micro, MIN_READ_TIMEOUT);

        let normal = read_timeout_until(now + Duration::from_millis(250), now).unwrap();
        assert_eq!(normal, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_receive_with_sub_microsecond_deadline_times_out() {
        let mut socket = match RawIcmpV4Socket::open() {
            Ok(socket) => socket,
            // Needs raw-socket privileges
            Err(_) => return,
        };

        for _ in 0..5 {
            socket.set_deadline(Instant::now() + Duration::from_nanos(300));
            let result = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(1500))
                .await
                .expect("receive blocked past its deadline");
            // Unrelated ICMP traffic may arrive first; a timeout is the common case
            if let Err(err) = result {
                let io_err = err.downcast_ref::<io::Error>().unwrap();
                assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
            }
        }
    }

    #[tokio::test]
    async fn test_open_or_permission_error() {
        // Works either with privileges or without; never a different error
        match RawIcmpV4Socket::open() {
            Ok(mut socket) => {
                socket.set_ttl(5).unwrap();
                socket.set_deadline(Instant::now());
                let err = socket.recv_from(1500).await.unwrap_err();
                let io_err = err.downcast_ref::<io::Error>().unwrap();
                assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
            }
            Err(TracerouteError::InsufficientPermissions { .. }) => {}
            Err(TracerouteError::SocketError(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
}
