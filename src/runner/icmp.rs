//! Unprivileged ICMP echo over a datagram socket.
//!
//! The kernel fills in identifier and checksum for `SOCK_DGRAM` ICMP sockets,
//! so the request is an 8-byte header with only the type set, followed by
//! [`ECHO_PAYLOAD`]. Packets are built and parsed with `pnet::packet`; replies
//! are validated for length, type and an exact payload echo.
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{IcmpCode, IcmpTypes};
use pnet::packet::icmpv6::{echo_reply as reply_v6, echo_request as request_v6};
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Types};
use pnet::packet::Packet;
use std::net::IpAddr;
use thiserror::Error;

use super::{ProbeError, TestContext};
use crate::types::{Socket, TestResult};

pub const ICMP_HEADER_LEN: usize = 8;
pub const ECHO_PAYLOAD: &[u8] = b"sockcheck echo probe";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IcmpError {
    #[error("icmp: cannot resolve {host}: {message}")]
    Resolve { host: String, message: String },
    #[error("icmp: cannot create socket: {0}")]
    Socket(String),
    #[error("icmp: send failed: {0}")]
    Send(String),
    #[error("icmp: receive failed: {0}")]
    Receive(String),
    #[error("icmp: short reply of {len} bytes")]
    ShortReply { len: usize },
    #[error("icmp: unexpected reply type {got} (want {want})")]
    WrongType { got: u8, want: u8 },
    #[error("icmp: reply payload does not match request")]
    PayloadMismatch,
    #[error("icmp: unsupported on this platform")]
    Unsupported,
}

/// Echo Request header plus the fixed payload.
pub fn echo_request(v6: bool) -> Result<Vec<u8>, IcmpError> {
    let mut pkt = vec![0u8; ICMP_HEADER_LEN + ECHO_PAYLOAD.len()];
    let too_small = || IcmpError::Send("echo request buffer too small".into());
    if v6 {
        let mut req = request_v6::MutableEchoRequestPacket::new(&mut pkt).ok_or_else(too_small)?;
        req.set_icmpv6_type(Icmpv6Types::EchoRequest);
        req.set_icmpv6_code(Icmpv6Code(0));
        req.set_payload(ECHO_PAYLOAD);
    } else {
        let mut req = MutableEchoRequestPacket::new(&mut pkt).ok_or_else(too_small)?;
        req.set_icmp_type(IcmpTypes::EchoRequest);
        req.set_icmp_code(IcmpCode(0));
        req.set_payload(ECHO_PAYLOAD);
    }
    Ok(pkt)
}

/// Check that `reply` is an Echo Reply carrying the same payload as `request`.
pub fn validate_reply(request: &[u8], reply: &[u8], v6: bool) -> Result<(), IcmpError> {
    let short = || IcmpError::ShortReply { len: reply.len() };
    let sent = EchoRequestPacket::new(request)
        .map(|p| p.payload().to_vec())
        .unwrap_or_default();
    let (got, want, payload) = if v6 {
        let pkt = reply_v6::EchoReplyPacket::new(reply).ok_or_else(short)?;
        (
            pkt.get_icmpv6_type().0,
            Icmpv6Types::EchoReply.0,
            pkt.payload().to_vec(),
        )
    } else {
        let pkt = EchoReplyPacket::new(reply).ok_or_else(short)?;
        (
            pkt.get_icmp_type().0,
            IcmpTypes::EchoReply.0,
            pkt.payload().to_vec(),
        )
    };
    if got != want {
        return Err(IcmpError::WrongType { got, want });
    }
    if payload != sent {
        return Err(IcmpError::PayloadMismatch);
    }
    Ok(())
}

/// Resolve to the first address the system resolver returns.
#[cfg_attr(not(unix), allow(dead_code))]
async fn resolve(host: &str) -> Result<IpAddr, IcmpError> {
    let host = super::bare_host(host);
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| IcmpError::Resolve {
            host: host.to_string(),
            message: e.to_string(),
        })?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| IcmpError::Resolve {
            host: host.to_string(),
            message: "no addresses".into(),
        })
}

pub async fn run_test(ctx: &TestContext, socket: Socket) -> TestResult {
    match ctx.run(ping(&socket.host)).await {
        Ok(Ok(())) => TestResult::passed(socket, None),
        Ok(Err(e)) => TestResult::failed(socket, None, ProbeError::Icmp(e)),
        Err(e) => TestResult::failed(socket, None, e),
    }
}

#[cfg(unix)]
async fn ping(host: &str) -> Result<(), IcmpError> {
    let ip = resolve(host).await?;
    sys::echo(ip).await
}

#[cfg(not(unix))]
async fn ping(_host: &str) -> Result<(), IcmpError> {
    Err(IcmpError::Unsupported)
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::net::{IpAddr, SocketAddr};
    use std::os::fd::FromRawFd;
    use tokio::net::UdpSocket;
    use tracing::debug;

    use super::{echo_request, validate_reply, IcmpError};

    fn open(ip: IpAddr) -> Result<UdpSocket, IcmpError> {
        let (domain, proto) = match ip {
            IpAddr::V4(_) => (libc::AF_INET, libc::IPPROTO_ICMP),
            IpAddr::V6(_) => (libc::AF_INET6, libc::IPPROTO_ICMPV6),
        };
        // SAFETY: socket(2) has no memory preconditions.
        let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM, proto) };
        if fd < 0 {
            return Err(IcmpError::Socket(io::Error::last_os_error().to_string()));
        }
        // SAFETY: `fd` was just returned by socket(2) and nothing else owns it.
        let std_sock = unsafe { std::net::UdpSocket::from_raw_fd(fd) };
        std_sock
            .set_nonblocking(true)
            .map_err(|e| IcmpError::Socket(e.to_string()))?;
        UdpSocket::from_std(std_sock).map_err(|e| IcmpError::Socket(e.to_string()))
    }

    /// Skip the IPv4 header that BSD-derived kernels prepend on ICMP datagram sockets.
    fn strip_ip_header(buf: &[u8], v6: bool) -> &[u8] {
        if cfg!(any(target_os = "macos", target_os = "ios", target_os = "freebsd")) && !v6 {
            if let Some(&first) = buf.first() {
                if first >> 4 == 4 {
                    let ihl = usize::from(first & 0x0f) * 4;
                    return buf.get(ihl..).unwrap_or_default();
                }
            }
        }
        buf
    }

    pub async fn echo(ip: IpAddr) -> Result<(), IcmpError> {
        let v6 = ip.is_ipv6();
        let sock = open(ip)?;
        let request = echo_request(v6)?;
        sock.send_to(&request, SocketAddr::new(ip, 0))
            .await
            .map_err(|e| IcmpError::Send(e.to_string()))?;
        let mut buf = [0u8; 1500];
        // Runs until a datagram from the target arrives; the caller's deadline bounds it.
        loop {
            let (n, from) = sock
                .recv_from(&mut buf)
                .await
                .map_err(|e| IcmpError::Receive(e.to_string()))?;
            if !is_from_target(from, ip) {
                debug!(%ip, %from, "skipping icmp datagram from another host");
                continue;
            }
            debug!(%ip, %from, bytes = n, "icmp reply");
            return validate_reply(&request, strip_ip_header(&buf[..n], v6), v6);
        }
    }

    fn is_from_target(from: SocketAddr, target: IpAddr) -> bool {
        from.ip() == target
    }

}
