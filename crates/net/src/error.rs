//! Protocol engine error types

use std::fmt;
use std::io;
use std::time::Duration;

use crate::protocol::Role;

/// Protocol engine result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while driving a message transfer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not resolve {address} to an IPv6 address: {reason}")]
    Resolution { address: String, reason: String },

    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("no free listening port after {attempts} bind attempts: {source}")]
    BindExhausted {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("not a netstring: {0}")]
    Framing(String),

    #[error("expected a frame tagged {expected} but got {found}")]
    UnexpectedRole { expected: Role, found: Role },

    #[error("server sent [{found}] should be [{expected}]")]
    ProtocolMismatch { expected: String, found: String },

    #[error("tokens do not match: server={found} client={expected}")]
    TokenMismatch { expected: String, found: String },

    #[error("no session token has been issued")]
    MissingToken,

    #[error("string lengths do not match: server={server} client={client}")]
    LengthMismatch { server: usize, client: usize },

    #[error("server error: {0}")]
    Server(String),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("{phase}: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Tag this error with the phase it occurred in
    pub fn in_phase(self, phase: Phase) -> Self {
        Error::Phase {
            phase,
            source: Box::new(self),
        }
    }

    /// The underlying cause, with all phase wrappers removed
    pub fn root(&self) -> &Error {
        match self {
            Error::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// The innermost phase this error was tagged with, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Phase { phase, source } => source.phase().or(Some(*phase)),
            _ => None,
        }
    }

    /// Whether the peer should be told about this failure with an `E` frame.
    ///
    /// The peer's own error reports are not echoed back.
    pub(crate) fn should_notify_peer(&self) -> bool {
        !matches!(self.root(), Error::Server(_))
    }
}

/// Protocol phase, used to label errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dial,
    VersionExchange,
    Nickname,
    TokenReceipt,
    DataPort,
    AwaitConnection,
    ProtocolConfirmation,
    IdentityResend,
    TokenValidation,
    Transfer,
    TokenRotation,
    LengthConfirmation,
    TokenHandoff,
    Acknowledgement,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Dial => "[control] dial",
            Phase::VersionExchange => "[control] protocol exchange",
            Phase::Nickname => "[control] send nickname",
            Phase::TokenReceipt => "[control] receive token",
            Phase::DataPort => "[control] send data port",
            Phase::AwaitConnection => "[data] await connection",
            Phase::ProtocolConfirmation => "[data] protocol confirmation",
            Phase::IdentityResend => "[data] send nickname",
            Phase::TokenValidation => "[data] validate token",
            Phase::Transfer => "[data] transfer message",
            Phase::TokenRotation => "[data] receive new token",
            Phase::LengthConfirmation => "[control] validate string length",
            Phase::TokenHandoff => "[control] send token",
            Phase::Acknowledgement => "[control] await ACK",
        };
        f.write_str(name)
    }
}
