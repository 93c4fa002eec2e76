//! Control channel: handshake, authentication and teardown

use tracing::{debug, info};

use crate::error::{Error, Phase, Result};
use crate::protocol::{Frame, Role, ACK, PROTOCOL_VERSION};
use crate::session::{ControlState, Session};
use crate::transport::{resolve_ipv6, Connection, DataListener};

impl Session {
    /// Open the control channel and negotiate the data channel.
    ///
    /// On success the server has issued a token and knows which port to
    /// connect back to.
    pub async fn connect(&mut self) -> Result<()> {
        info!(
            address = %self.remote_address,
            port = self.remote_control_port,
            "Started connection"
        );

        self.dial().await.map_err(|e| e.in_phase(Phase::Dial))?;

        self.exchange_protocol_version()
            .await
            .map_err(|e| e.in_phase(Phase::VersionExchange))?;
        self.control_state = ControlState::VersionExchanged;

        let nickname = self.nickname.clone();
        self.send_ctrl(&nickname)
            .await
            .map_err(|e| e.in_phase(Phase::Nickname))?;

        self.receive_token()
            .await
            .map_err(|e| e.in_phase(Phase::TokenReceipt))?;
        self.control_state = ControlState::Authenticated;

        self.open_data_port()
            .await
            .map_err(|e| e.in_phase(Phase::DataPort))?;
        self.control_state = ControlState::DataPortSent;

        Ok(())
    }

    /// Confirm the transfer with the server and close the control channel
    pub async fn disconnect(&mut self) -> Result<()> {
        self.validate_string_length()
            .await
            .map_err(|e| e.in_phase(Phase::LengthConfirmation))?;
        self.control_state = ControlState::TeardownLengthConfirmed;

        let token = self
            .require_token()
            .map_err(|e| e.in_phase(Phase::TokenHandoff))?
            .to_string();
        self.send_ctrl(&token)
            .await
            .map_err(|e| e.in_phase(Phase::TokenHandoff))?;
        self.control_state = ControlState::TokenHandedOff;

        self.await_ack()
            .await
            .map_err(|e| e.in_phase(Phase::Acknowledgement))?;
        info!("Server accepted message transfer");

        if let Some(control) = self.control.take() {
            control.close().await;
        }
        self.control_state = ControlState::Closed;

        Ok(())
    }

    async fn dial(&mut self) -> Result<()> {
        let addr = resolve_ipv6(&self.remote_address, self.remote_control_port).await?;
        let conn = Connection::connect(addr).await?;
        info!(peer = %conn.peer_addr(), "Established control channel");
        self.control = Some(conn);
        Ok(())
    }

    async fn exchange_protocol_version(&mut self) -> Result<()> {
        self.send_ctrl(PROTOCOL_VERSION).await?;

        let version = self.recv_ctrl().await?;
        if version != PROTOCOL_VERSION {
            let err = Error::ProtocolMismatch {
                expected: PROTOCOL_VERSION.to_string(),
                found: version,
            };
            return Err(self.control_channel()?.reject(err).await);
        }

        info!("Successfully exchanged protocol version");
        Ok(())
    }

    async fn receive_token(&mut self) -> Result<()> {
        let token = self.recv_ctrl().await?;
        if token.is_empty() {
            return Err(self.control_channel()?.reject(Error::MissingToken).await);
        }
        debug!("Received session token");
        self.token = Some(token);
        Ok(())
    }

    async fn open_data_port(&mut self) -> Result<()> {
        let listener = DataListener::bind(
            self.config.bind_addr,
            self.config.data_port_range.clone(),
            self.config.bind_attempts,
        )?;
        let port = listener.port();
        self.data_port = Some(port);
        self.listener = Some(listener);

        self.send_ctrl(&port.to_string()).await?;
        info!(port = port, "Sent listening port to server");
        Ok(())
    }

    async fn validate_string_length(&mut self) -> Result<()> {
        let client = self
            .last_message_length
            .ok_or(Error::InvalidInput("no message has been transferred"))?;

        let reported = self.recv_ctrl().await?;
        let err = match reported.parse::<usize>() {
            Ok(server) if server == client => {
                info!(length = client, "Server sent valid string length");
                return Ok(());
            }
            Ok(server) => Error::LengthMismatch { server, client },
            Err(_) => Error::ProtocolMismatch {
                expected: client.to_string(),
                found: reported,
            },
        };
        Err(self.control_channel()?.reject(err).await)
    }

    async fn await_ack(&mut self) -> Result<()> {
        let reply = self.recv_ctrl().await?;
        if reply != ACK {
            let err = Error::ProtocolMismatch {
                expected: ACK.to_string(),
                found: reply,
            };
            return Err(self.control_channel()?.reject(err).await);
        }
        Ok(())
    }

    fn control_channel(&mut self) -> Result<&mut Connection> {
        self.control.as_mut().ok_or(Error::ConnectionClosed)
    }

    async fn send_ctrl(&mut self, body: &str) -> Result<()> {
        self.control_channel()?
            .send(&Frame::client_control(body))
            .await
    }

    async fn recv_ctrl(&mut self) -> Result<String> {
        let timeout = self.config.control_timeout;
        self.control_channel()?
            .recv_body(Role::ServerControl, timeout)
            .await
    }
}
