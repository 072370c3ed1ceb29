//! Fire-and-forget UDP delivery of encoded packets.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::BroadcastPort;
use crate::error::RelayError;

/// Limited broadcast: every host on the local segment.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Something that can put a datagram on the wire without blocking.
pub trait DatagramTransport: Send + Sync {
    fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl DatagramTransport for UdpSocket {
    fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.send_to(payload, target)
    }
}

/// Why a packet was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The unicast address did not parse as an IP address.
    InvalidAddress,
    /// The socket reported an error (including `WouldBlock`).
    Network(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { bytes: usize },
    Dropped(DropReason),
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

#[derive(Debug, Default)]
pub struct BroadcastStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the relay's UDP endpoint.
///
/// Every failure is reported as [`SendOutcome::Dropped`]; nothing is retried
/// or buffered.
pub struct Broadcaster {
    transport: Box<dyn DatagramTransport>,
    port: AtomicU16,
    stats: BroadcastStats,
}

impl Broadcaster {
    /// Bind an ephemeral broadcast-enabled, non-blocking socket targeting
    /// `255.255.255.255:port`.
    pub fn bind(port: BroadcastPort) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(RelayError::Bind)?;
        socket.set_broadcast(true).map_err(RelayError::Bind)?;
        socket.set_nonblocking(true).map_err(RelayError::Bind)?;
        if let Ok(local) = socket.local_addr() {
            info!(local = %local, port = port.get(), "UDP broadcaster bound");
        }
        Ok(Self::with_transport(Box::new(socket), port))
    }

    pub fn with_transport(transport: Box<dyn DatagramTransport>, port: BroadcastPort) -> Self {
        Self {
            transport,
            port: AtomicU16::new(port.get()),
            stats: BroadcastStats::default(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Acquire)
    }

    /// Retarget subsequent sends.
    pub fn update_port(&self, port: BroadcastPort) {
        let previous = self.port.swap(port.get(), Ordering::AcqRel);
        if previous != port.get() {
            info!(from = previous, to = port.get(), "broadcast port changed");
        }
    }

    pub fn target(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(BROADCAST_ADDR), self.port())
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Send to the broadcast endpoint.
    pub fn send(&self, packet: &[u8]) -> SendOutcome {
        self.deliver(packet, self.target())
    }

    /// Send to one host. Unparseable addresses are dropped like any other
    /// failure.
    pub fn send_to(&self, packet: &[u8], address: &str, port: u16) -> SendOutcome {
        match address.trim().parse::<IpAddr>() {
            Ok(ip) => self.deliver(packet, SocketAddr::new(ip, port)),
            Err(_) => {
                debug!(address, "unicast address does not parse; packet dropped");
                self.dropped(DropReason::InvalidAddress)
            }
        }
    }

    fn deliver(&self, packet: &[u8], target: SocketAddr) -> SendOutcome {
        match self.transport.send_datagram(packet, target) {
            Ok(bytes) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Sent { bytes }
            }
            Err(err) => {
                debug!(%target, error = %err, "packet dropped");
                self.dropped(DropReason::Network(err.kind()))
            }
        }
    }

    fn dropped(&self, reason: DropReason) -> SendOutcome {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        SendOutcome::Dropped(reason)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("target", &self.target())
            .field("sent", &self.stats.sent())
            .field("dropped", &self.stats.dropped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    struct Refusing;

    impl DatagramTransport for Refusing {
        fn send_datagram(&self, _payload: &[u8], _target: SocketAddr) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
    }

    #[test]
    fn targets_limited_broadcast() -> TestResult {
        let broadcaster = Broadcaster::with_transport(Box::new(Refusing), BroadcastPort::new(20777)?);
        assert_eq!(broadcaster.target(), "255.255.255.255:20777".parse::<SocketAddr>()?);

        broadcaster.update_port(BroadcastPort::new(30000)?);
        assert_eq!(broadcaster.target(), "255.255.255.255:30000".parse::<SocketAddr>()?);
        Ok(())
    }

    #[test]
    fn network_errors_become_drops() -> TestResult {
        let broadcaster = Broadcaster::with_transport(Box::new(Refusing), BroadcastPort::DEFAULT);
        let outcome = broadcaster.send(&[1, 2, 3]);
        assert_eq!(
            outcome,
            SendOutcome::Dropped(DropReason::Network(io::ErrorKind::WouldBlock))
        );
        assert_eq!(broadcaster.stats().dropped(), 1);
        assert_eq!(broadcaster.stats().sent(), 0);
        Ok(())
    }

    #[test]
    fn bad_unicast_address_is_dropped() {
        let broadcaster = Broadcaster::with_transport(Box::new(Refusing), BroadcastPort::DEFAULT);
        assert_eq!(
            broadcaster.send_to(&[0; 4], "dashboard.local", 20777),
            SendOutcome::Dropped(DropReason::InvalidAddress)
        );
        assert_eq!(broadcaster.stats().dropped(), 1);
    }

    #[test]
    fn unicast_reaches_a_loopback_listener() -> TestResult {
        let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
        listener.set_read_timeout(Some(Duration::from_secs(2)))?;
        let port = listener.local_addr()?.port();

        let broadcaster = Broadcaster::bind(BroadcastPort::DEFAULT)?;
        let outcome = broadcaster.send_to(b"OMG1-test", "127.0.0.1", port);
        assert_eq!(outcome, SendOutcome::Sent { bytes: 9 });

        let mut buf = [0u8; 64];
        let (len, _) = listener.recv_from(&mut buf)?;
        assert_eq!(buf.get(..len), Some(&b"OMG1-test"[..]));
        assert_eq!(broadcaster.stats().sent(), 1);
        Ok(())
    }
}
