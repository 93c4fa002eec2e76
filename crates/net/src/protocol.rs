//! Role-tagged frame bodies
//!
//! Every netstring payload is `<role><space><body>`. Frames are decoded into
//! [`Frame`] once, at the connection boundary.

use std::fmt;

use crate::error::{Error, Result};
use crate::netstring;

/// Protocol version string exchanged on both channels
pub const PROTOCOL_VERSION: &str = "GRNVS V:1.0";

/// Body the server sends to acknowledge a completed transfer
pub const ACK: &str = "ACK";

/// Sender and channel of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `C`: client on the control channel
    ClientControl,
    /// `S`: server on the control channel
    ServerControl,
    /// `D`: client on the data channel
    ClientData,
    /// `T`: server on the data channel
    ServerData,
    /// `E`: error notification from either side
    Error,
}

impl Role {
    pub fn prefix(self) -> char {
        match self {
            Role::ClientControl => 'C',
            Role::ServerControl => 'S',
            Role::ClientData => 'D',
            Role::ServerData => 'T',
            Role::Error => 'E',
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "C" => Some(Role::ClientControl),
            "S" => Some(Role::ServerControl),
            "D" => Some(Role::ClientData),
            "T" => Some(Role::ServerData),
            "E" => Some(Role::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Control channel traffic (`C` or `S`)
    Control { role: Role, body: String },
    /// Data channel traffic (`D` or `T`)
    Data { role: Role, body: String },
    /// Error notification (`E`)
    Error(String),
}

impl Frame {
    pub fn client_control(body: impl Into<String>) -> Self {
        Frame::Control {
            role: Role::ClientControl,
            body: body.into(),
        }
    }

    pub fn server_control(body: impl Into<String>) -> Self {
        Frame::Control {
            role: Role::ServerControl,
            body: body.into(),
        }
    }

    pub fn client_data(body: impl Into<String>) -> Self {
        Frame::Data {
            role: Role::ClientData,
            body: body.into(),
        }
    }

    pub fn server_data(body: impl Into<String>) -> Self {
        Frame::Data {
            role: Role::ServerData,
            body: body.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Frame::Error(description.into())
    }

    pub fn role(&self) -> Role {
        match self {
            Frame::Control { role, .. } | Frame::Data { role, .. } => *role,
            Frame::Error(_) => Role::Error,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Frame::Control { body, .. } | Frame::Data { body, .. } => body,
            Frame::Error(body) => body,
        }
    }

    /// Render as a netstring payload (`<role> <body>`)
    pub fn to_payload(&self) -> String {
        format!("{} {}", self.role(), self.body())
    }

    /// Render as a complete netstring ready for the wire
    pub fn encode(&self) -> String {
        netstring::encode(&self.to_payload())
    }

    /// Parse a netstring payload
    pub fn parse(payload: &str) -> Result<Self> {
        let (prefix, body) = payload
            .split_once(' ')
            .ok_or_else(|| Error::Framing(format!("response malformed: {}", payload)))?;
        let role = Role::from_prefix(prefix)
            .ok_or_else(|| Error::Framing(format!("unknown role prefix: {}", payload)))?;
        let body = body.to_string();

        Ok(match role {
            Role::ClientControl | Role::ServerControl => Frame::Control { role, body },
            Role::ClientData | Role::ServerData => Frame::Data { role, body },
            Role::Error => Frame::Error(body),
        })
    }

    /// Take the body of a frame sent with `expected` role.
    ///
    /// An `E` frame becomes [`Error::Server`] with its body verbatim.
    pub fn expect(self, expected: Role) -> Result<String> {
        match self {
            Frame::Error(body) => Err(Error::Server(body)),
            Frame::Control { role, body } | Frame::Data { role, body } if role == expected => {
                Ok(body)
            }
            other => Err(Error::UnexpectedRole {
                expected,
                found: other.role(),
            }),
        }
    }
}
