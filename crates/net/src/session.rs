//! Per-transfer session state
//!
//! A [`Session`] lives for exactly one message send. It owns both channel
//! handles, so every socket it opened is released when it is dropped.

use std::net::Ipv6Addr;
use std::ops::Range;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{Connection, DataListener};

/// Reply deadline on the control channel
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(3);

/// Reply deadline on the data channel
pub const DATA_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the server to open the data channel
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Listening port bind attempts before giving up
pub const BIND_ATTEMPTS: u32 = 5;

/// Ports the data channel listener is drawn from
pub const DATA_PORT_RANGE: Range<u16> = 1024..49151;

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub control_timeout: Duration,
    pub data_timeout: Duration,
    pub accept_timeout: Duration,
    pub bind_attempts: u32,
    pub data_port_range: Range<u16>,
    /// Local address the data listener binds to
    pub bind_addr: Ipv6Addr,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_timeout: CONTROL_TIMEOUT,
            data_timeout: DATA_TIMEOUT,
            accept_timeout: ACCEPT_TIMEOUT,
            bind_attempts: BIND_ATTEMPTS,
            data_port_range: DATA_PORT_RANGE,
            bind_addr: Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Progress of the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Dialing,
    VersionExchanged,
    Authenticated,
    DataPortSent,
    TeardownLengthConfirmed,
    TokenHandedOff,
    Closed,
}

/// Progress of the data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    AwaitingConnection,
    ProtocolConfirmed,
    NicknameResent,
    TokenValidated,
    MessageSent,
    TokenRotated,
    Closed,
}

/// State of one message transfer
#[derive(Debug)]
pub struct Session {
    pub(crate) nickname: String,
    pub(crate) remote_address: String,
    pub(crate) remote_control_port: u16,
    pub(crate) config: SessionConfig,

    pub(crate) control: Option<Connection>,
    pub(crate) listener: Option<DataListener>,
    pub(crate) data: Option<Connection>,
    pub(crate) data_port: Option<u16>,

    pub(crate) token: Option<String>,
    pub(crate) last_message_length: Option<usize>,

    pub(crate) control_state: ControlState,
    pub(crate) data_state: DataState,
}

impl Session {
    /// Create a session; no network activity happens until
    /// [`Session::connect`].
    pub fn new(
        nickname: impl Into<String>,
        remote_address: impl Into<String>,
        remote_control_port: u16,
        config: SessionConfig,
    ) -> Result<Self> {
        let nickname = nickname.into();
        if nickname.is_empty() {
            return Err(Error::InvalidInput("nickname must not be empty"));
        }

        Ok(Self {
            nickname,
            remote_address: remote_address.into(),
            remote_control_port,
            config,
            control: None,
            listener: None,
            data: None,
            data_port: None,
            token: None,
            last_message_length: None,
            control_state: ControlState::Dialing,
            data_state: DataState::AwaitingConnection,
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn remote_control_port(&self) -> u16 {
        self.remote_control_port
    }

    /// Current session token, if one has been issued
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Byte length of the message last sent on the data channel
    pub fn last_message_length(&self) -> Option<usize> {
        self.last_message_length
    }

    /// Port the data channel listener was bound to
    pub fn data_port(&self) -> Option<u16> {
        self.data_port
    }

    pub fn control_state(&self) -> ControlState {
        self.control_state
    }

    pub fn data_state(&self) -> DataState {
        self.data_state
    }

    /// The token, failing fast if none was issued
    pub(crate) fn require_token(&self) -> Result<&str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::MissingToken),
        }
    }

    /// Release every socket still held; each handle is closed at most once.
    pub async fn close(&mut self) {
        if let Some(data) = self.data.take() {
            data.close().await;
        }
        self.listener = None;
        if let Some(control) = self.control.take() {
            control.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_protocol_deadlines() {
        let config = SessionConfig::default();
        assert_eq!(config.control_timeout, Duration::from_secs(3));
        assert_eq!(config.data_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_attempts, 5);
        assert_eq!(config.data_port_range, 1024..49151);
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new("alice", "::1", 1337, SessionConfig::default()).unwrap();
        assert_eq!(session.control_state(), ControlState::Dialing);
        assert_eq!(session.data_state(), DataState::AwaitingConnection);
        assert!(session.token().is_none());
        assert!(session.data_port().is_none());
    }

    #[test]
    fn test_empty_nickname_rejected() {
        let result = Session::new("", "::1", 1337, SessionConfig::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_token_fails_fast() {
        let mut session = Session::new("alice", "::1", 1337, SessionConfig::default()).unwrap();
        assert!(matches!(session.require_token(), Err(Error::MissingToken)));

        session.token = Some(String::new());
        assert!(matches!(session.require_token(), Err(Error::MissingToken)));

        session.token = Some("abc123".into());
        assert_eq!(session.require_token().unwrap(), "abc123");
    }
}
