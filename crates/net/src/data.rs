//! Data channel: the server connects back and the message is transferred

use tracing::{debug, info};

use crate::error::{Error, Phase, Result};
use crate::protocol::{Frame, Role, PROTOCOL_VERSION};
use crate::session::{DataState, Session};
use crate::transport::Connection;

impl Session {
    /// Accept the server's data connection and transfer `message` over it.
    ///
    /// Requires a prior successful [`Session::connect`]. Afterwards the
    /// session holds the rotated token and the message length.
    pub async fn transfer(&mut self, message: &str) -> Result<()> {
        // Also checked by `Client::send_message`; this covers callers that
        // drive a `Session` directly.
        if message.is_empty() {
            return Err(Error::InvalidInput("tried to send empty string"));
        }

        self.await_server_connection()
            .await
            .map_err(|e| e.in_phase(Phase::AwaitConnection))?;

        self.recv_protocol_confirmation()
            .await
            .map_err(|e| e.in_phase(Phase::ProtocolConfirmation))?;
        self.data_state = DataState::ProtocolConfirmed;

        let nickname = self.nickname.clone();
        self.send_data(&nickname)
            .await
            .map_err(|e| e.in_phase(Phase::IdentityResend))?;
        self.data_state = DataState::NicknameResent;

        self.validate_token()
            .await
            .map_err(|e| e.in_phase(Phase::TokenValidation))?;
        self.data_state = DataState::TokenValidated;

        self.send_data(message)
            .await
            .map_err(|e| e.in_phase(Phase::Transfer))?;
        self.last_message_length = Some(message.len());
        self.data_state = DataState::MessageSent;
        info!(length = message.len(), "Message successfully transferred");

        self.rotate_token()
            .await
            .map_err(|e| e.in_phase(Phase::TokenRotation))?;
        self.data_state = DataState::TokenRotated;

        if let Some(data) = self.data.take() {
            data.close().await;
        }
        self.data_state = DataState::Closed;

        Ok(())
    }

    async fn await_server_connection(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or(Error::InvalidInput("data channel listener is not bound"))?;
        let port = listener.port();

        let conn = listener.accept(self.config.accept_timeout).await?;
        info!(port = port, peer = %conn.peer_addr(), "Server connected on data channel");
        self.data = Some(conn);
        Ok(())
    }

    async fn recv_protocol_confirmation(&mut self) -> Result<()> {
        let version = self.recv_data().await?;
        if version != PROTOCOL_VERSION {
            let err = Error::ProtocolMismatch {
                expected: PROTOCOL_VERSION.to_string(),
                found: version,
            };
            return Err(self.data_channel()?.reject(err).await);
        }
        Ok(())
    }

    async fn validate_token(&mut self) -> Result<()> {
        let expected = self.require_token()?.to_string();
        let found = self.recv_data().await?;
        if found != expected {
            let err = Error::TokenMismatch { expected, found };
            return Err(self.data_channel()?.reject(err).await);
        }
        debug!("Server presented the session token");
        Ok(())
    }

    async fn rotate_token(&mut self) -> Result<()> {
        let token = self.recv_data().await?;
        if token.is_empty() {
            return Err(self.data_channel()?.reject(Error::MissingToken).await);
        }
        self.token = Some(token);
        info!("Received new token");
        Ok(())
    }

    fn data_channel(&mut self) -> Result<&mut Connection> {
        self.data.as_mut().ok_or(Error::ConnectionClosed)
    }

    async fn send_data(&mut self, body: &str) -> Result<()> {
        self.data_channel()?.send(&Frame::client_data(body)).await
    }

    async fn recv_data(&mut self) -> Result<String> {
        let timeout = self.config.data_timeout;
        self.data_channel()?
            .recv_body(Role::ServerData, timeout)
            .await
    }
}
