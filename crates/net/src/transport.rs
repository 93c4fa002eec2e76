//! Socket lifecycle for the control and data channels
//!
//! [`Connection`] owns a stream plus its receive buffer and is closed when it
//! is consumed by [`Connection::close`] or dropped. [`DataListener`] owns the
//! single-use listening socket of the data channel.

use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::ops::Range;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::netstring::split_frame;
use crate::protocol::{Frame, Role};

/// Initial capacity of a connection's receive buffer
const RECV_BUFFER_SIZE: usize = 4096;

/// Resolve `address` to an IPv6 socket address.
///
/// Accepts literals (optionally bracketed) and host names. Names that only
/// resolve to IPv4 fail with [`Error::Resolution`].
pub async fn resolve_ipv6(address: &str, port: u16) -> Result<SocketAddrV6> {
    let host = address
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(address);

    let resolution_error = |reason: String| Error::Resolution {
        address: address.to_string(),
        reason,
    };

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| resolution_error(e.to_string()))?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V6(v6) => Some(v6),
            SocketAddr::V4(_) => None,
        })
        .next()
        .ok_or_else(|| resolution_error("no IPv6 address found".into()))
}

/// An established stream with its own frame buffer
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
    peer: SocketAddr,
}

impl Connection {
    /// Dial the remote side
    pub async fn connect(addr: SocketAddrV6) -> Result<Self> {
        let stream = TcpStream::connect(SocketAddr::V6(addr))
            .await
            .map_err(Error::Connect)?;
        Ok(Self::from_stream(stream, SocketAddr::V6(addr)))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(RECV_BUFFER_SIZE),
            peer,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write one frame
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let wire = frame.encode();
        trace!(peer = %self.peer, frame = %wire, "Sending frame");
        self.stream
            .write_all(wire.as_bytes())
            .await
            .map_err(Error::Send)?;
        self.stream.flush().await.map_err(Error::Send)
    }

    /// Receive one frame, failing with [`Error::Timeout`] if it does not
    /// arrive in time.
    ///
    /// A read still in flight when the deadline passes is dropped; any bytes
    /// it would have delivered are lost with the connection.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Frame> {
        tokio::time::timeout(timeout, self.read_frame())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((payload, used)) = split_frame(&self.buffer)? {
                self.buffer.drain(..used);
                trace!(peer = %self.peer, payload = %payload, "Received frame");
                return Frame::parse(&payload);
            }

            self.buffer.reserve(RECV_BUFFER_SIZE);
            let n = self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .map_err(Error::Receive)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Receive one frame and take its body, which must carry `role`.
    ///
    /// Failures are reported to the peer before being returned.
    pub async fn recv_body(&mut self, role: Role, timeout: Duration) -> Result<String> {
        let result = match self.recv_timeout(timeout).await {
            Ok(frame) => frame.expect(role),
            Err(e) => Err(e),
        };
        match result {
            Ok(body) => Ok(body),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// Tell the peer about `error` with a best-effort `E` frame, then hand
    /// the error back. Notification failures are only logged.
    pub async fn reject(&mut self, error: Error) -> Error {
        if error.should_notify_peer() {
            if let Err(e) = self.send(&Frame::error(error.to_string())).await {
                debug!(peer = %self.peer, error = %e, "Could not notify peer of error");
            }
        }
        error
    }

    /// Shut the stream down and release it
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Shutdown failed");
        }
        debug!(peer = %self.peer, "Connection closed");
    }
}

/// Listening socket for the single inbound data connection
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
    port: u16,
}

impl DataListener {
    /// Bind to a random port in `ports`, retrying with a fresh port up to
    /// `attempts` times.
    pub fn bind(addr: Ipv6Addr, ports: Range<u16>, attempts: u32) -> Result<Self> {
        if ports.is_empty() {
            return Err(Error::InvalidInput("listening port range is empty"));
        }

        let mut last_err = io::Error::new(io::ErrorKind::AddrInUse, "no bind attempts made");
        for attempt in 1..=attempts {
            let port = rand::thread_rng().gen_range(ports.clone());
            match Self::try_bind(addr, port) {
                Ok(listener) => {
                    debug!(port = port, attempt = attempt, "Bound data socket");
                    return Ok(Self { listener, port });
                }
                Err(e) => {
                    warn!(port = port, attempt = attempt, error = %e, "Bind failed");
                    last_err = e;
                }
            }
        }

        Err(Error::BindExhausted {
            attempts,
            source: last_err,
        })
    }

    fn try_bind(addr: Ipv6Addr, port: u16) -> io::Result<TcpListener> {
        let socket = TcpSocket::new_v6()?;
        socket.bind(SocketAddr::V6(SocketAddrV6::new(addr, port, 0, 0)))?;
        socket.listen(1)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept exactly one connection, then drop the listening socket
    pub async fn accept(self, timeout: Duration) -> Result<Connection> {
        let (stream, peer) = tokio::time::timeout(timeout, self.listener.accept())
            .await
            .map_err(|_| Error::Timeout(timeout))?
            .map_err(Error::Receive)?;
        debug!(peer = %peer, port = self.port, "Accepted data connection");
        Ok(Connection::from_stream(stream, peer))
    }
}
