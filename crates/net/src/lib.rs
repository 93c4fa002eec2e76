//! GRNVS message client
//!
//! Sends a single text message to a server over two TCP connections.
//!
//! # Architecture
//!
//! - **Control channel**: dialled by the client; version handshake,
//!   authentication and teardown
//! - **Data channel**: opened by the server back to a port the client
//!   announces; carries the message itself
//! - **Protocol**: netstring frames whose payload is `<role> <body>`
//!
//! # Usage
//!
//! ```ignore
//! let receipt = grnvs_net::send_message("alice", "::1", 1337, "hi").await?;
//! println!("delivered {} bytes", receipt.message_length);
//! ```

pub mod client;
mod control;
mod data;
pub mod error;
pub mod netstring;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::{send_message, Client, Receipt};
pub use error::{Error, Phase, Result};
pub use protocol::{Frame, Role, ACK, PROTOCOL_VERSION};
pub use session::{ControlState, DataState, Session, SessionConfig};

/// Default control channel port of a GRNVS server
pub const DEFAULT_PORT: u16 = 1337;
