//! A single connect attempt and the classification of its outcome.
//!
//! The probe races a non-blocking connect against a timer. Whichever
//! finishes first decides the attempt; the loser is dropped, which for a
//! pending connect closes its socket. The outcome is then mapped onto the
//! port state taxonomy exactly once.

use crate::results::PortState;
use crate::scanner::throttle::ThrottlePermit;
use async_trait::async_trait;
use socket2::SockRef;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpSocket;
use tracing::trace;

/// Something that can complete (and immediately tear down) a TCP
/// handshake with a remote address.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `addr`, confirm the socket is connected, then close it.
    async fn handshake(&self, addr: SocketAddr) -> io::Result<()>;
}

/// The operating system's TCP stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn handshake(&self, addr: SocketAddr) -> io::Result<()> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        let stream = socket.connect(addr).await?;

        // A completed connect without a peer is not a real connection.
        stream.peer_addr()?;

        // Close with RST so the local port is not held in TIME_WAIT.
        if let Err(e) = SockRef::from(&stream).set_linger(Some(Duration::ZERO)) {
            trace!(%addr, "Failed to set linger: {}", e);
        }
        Ok(())
    }
}

/// How a single attempt ended.
#[derive(Debug)]
pub enum Outcome {
    /// Handshake completed.
    Open,
    /// Connection actively refused.
    Closed,
    /// Permission denied on the way out or by the path.
    Filtered,
    /// No answer before the timer fired.
    TimedOut,
    /// The OS would not hand out another socket; worth retrying.
    Exhausted(io::Error),
    /// Anything else.
    Unknown(io::Error),
}

impl Outcome {
    /// The port state this outcome stands for, if it is a port state at
    /// all.
    pub fn port_state(&self) -> Option<PortState> {
        match self {
            Self::Open => Some(PortState::Open),
            Self::Closed => Some(PortState::Closed),
            Self::Filtered | Self::TimedOut => Some(PortState::Filtered),
            Self::Exhausted(_) | Self::Unknown(_) => None,
        }
    }
}

/// Map a connect error onto an outcome.
pub fn classify(err: io::Error) -> Outcome {
    if is_resource_exhaustion(&err) {
        return Outcome::Exhausted(err);
    }

    match err.kind() {
        io::ErrorKind::ConnectionRefused => Outcome::Closed,
        io::ErrorKind::PermissionDenied => Outcome::Filtered,
        io::ErrorKind::TimedOut => Outcome::TimedOut,
        _ => Outcome::Unknown(err),
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::EAGAIN | libc::EADDRNOTAVAIL)
    )
}

#[cfg(windows)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    // WSAEMFILE, WSAENOBUFS
    matches!(err.raw_os_error(), Some(10024 | 10055))
}

#[cfg(not(any(unix, windows)))]
fn is_resource_exhaustion(_err: &io::Error) -> bool {
    false
}

/// Race one handshake against `timeout`.
///
/// The throttle slot is given back as soon as the race is decided and the
/// losing side has been dropped.
pub async fn probe(
    connector: &dyn Connector,
    addr: SocketAddr,
    timeout: Duration,
    permit: ThrottlePermit,
) -> Outcome {
    let outcome = tokio::select! {
        result = connector.handshake(addr) => match result {
            Ok(()) => Outcome::Open,
            Err(e) => classify(e),
        },
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
    };

    permit.release();
    outcome
}
