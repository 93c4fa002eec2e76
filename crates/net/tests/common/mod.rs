//! Scripted server side of the protocol for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use grnvs_net::netstring::{encode, split_frame};
use grnvs_net::SessionConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Upper bound on any single wait inside a script
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session config with short deadlines so failure tests finish quickly
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        control_timeout: Duration::from_millis(300),
        data_timeout: Duration::from_millis(300),
        accept_timeout: Duration::from_millis(500),
        ..SessionConfig::default()
    }
}

/// One end of a connection, speaking raw netstring payloads
pub struct Peer {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Peer {
    /// Connect to the client's data listener
    pub async fn connect_data(port: u16) -> Self {
        let stream = TcpStream::connect(("::1", port))
            .await
            .expect("connect to data port");
        Self::new(stream)
    }

    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    pub async fn send(&mut self, payload: &str) {
        self.stream
            .write_all(encode(payload).as_bytes())
            .await
            .expect("write frame");
    }

    /// Write bytes as-is, without netstring framing
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write raw bytes");
    }

    /// Next payload, or `None` once the client has closed the connection
    pub async fn recv_opt(&mut self) -> Option<String> {
        tokio::time::timeout(SCRIPT_TIMEOUT, async {
            loop {
                if let Some((payload, used)) = split_frame(&self.buffer).expect("valid netstring") {
                    self.buffer.drain(..used);
                    return Some(payload);
                }
                let mut chunk = [0u8; 1024];
                match self.stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return None,
                    Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                }
            }
        })
        .await
        .expect("client went silent")
    }

    pub async fn recv(&mut self) -> String {
        self.recv_opt().await.expect("client closed the connection")
    }

    /// Read the data port announcement from the control channel
    pub async fn recv_data_port(&mut self) -> u16 {
        let announcement = self.recv().await;
        announcement
            .strip_prefix("C ")
            .and_then(|port| port.parse().ok())
            .unwrap_or_else(|| panic!("expected a port announcement, got {announcement}"))
    }

    /// Play the server's side of the handshake up to the port announcement
    pub async fn handshake(&mut self, nickname: &str, token: &str) -> u16 {
        assert_eq!(self.recv().await, "C GRNVS V:1.0");
        self.send("S GRNVS V:1.0").await;
        assert_eq!(self.recv().await, format!("C {nickname}"));
        self.send(&format!("S {token}")).await;
        self.recv_data_port().await
    }
}

/// A scripted server accepting one control connection
pub struct TestServer {
    pub port: u16,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server that runs `script` against the first control
    /// connection. Panics when the host has no IPv6 loopback.
    pub async fn spawn<F, Fut>(script: F) -> Self
    where
        F: FnOnce(Peer) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("[::1]:0")
            .await
            .expect("these tests need an IPv6 loopback ([::1])");
        let port = listener.local_addr().expect("local addr").port();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept control");
            script(Peer::new(stream)).await;
        });

        Self { port, handle }
    }

    /// Wait for the script to finish, re-raising its assertion failures
    pub async fn finish(self) {
        tokio::time::timeout(SCRIPT_TIMEOUT, self.handle)
            .await
            .expect("script did not finish")
            .expect("script panicked");
    }
}
