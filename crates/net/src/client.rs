//! One-shot message sending
//!
//! Drives a [`Session`] through connect, transfer and disconnect, closing
//! every socket it opened whether or not the transfer succeeds.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::session::{Session, SessionConfig};

/// Outcome of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Token the server rotated in during the transfer
    pub token: String,
    /// Byte length of the transferred message, as confirmed by the server
    pub message_length: usize,
    /// Local port the server connected back to
    pub data_port: u16,
}

/// Message sending client
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: SessionConfig,
}

impl Client {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Send `message` to the server at `address`:`port` as `nickname`
    pub async fn send_message(
        &self,
        nickname: &str,
        address: &str,
        port: u16,
        message: &str,
    ) -> Result<Receipt> {
        if message.is_empty() {
            return Err(Error::InvalidInput("tried to send empty string"));
        }

        let mut session = Session::new(nickname, address, port, self.config.clone())?;
        let result = run(&mut session, message).await;
        session.close().await;

        match &result {
            Ok(_) => info!(nickname = %nickname, "Message delivered"),
            Err(e) => warn!(nickname = %nickname, error = %e, "Message transfer failed"),
        }
        result
    }
}

async fn run(session: &mut Session, message: &str) -> Result<Receipt> {
    session.connect().await?;
    session.transfer(message).await?;
    session.disconnect().await?;

    Ok(Receipt {
        token: session.require_token()?.to_string(),
        message_length: session.last_message_length().unwrap_or(message.len()),
        data_port: session.data_port().unwrap_or_default(),
    })
}

/// Send one message with the default configuration
pub async fn send_message(
    nickname: &str,
    address: &str,
    port: u16,
    message: &str,
) -> Result<Receipt> {
    Client::default()
        .send_message(nickname, address, port, message)
        .await
}
