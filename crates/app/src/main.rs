//! asciiclient - send one text message to a GRNVS server

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{AppConfig, ConfigError};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("tried to send empty string")]
    EmptyMessage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Send(#[from] grnvs_net::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "asciiclient",
    about = "Send a text message to a GRNVS server",
    override_usage = "asciiclient -m <MESSAGE> <NICK> <DESTINATION>"
)]
struct Cli {
    /// Message to send
    #[arg(short, long)]
    message: String,

    /// Nickname to send the message as
    nick: String,

    /// Server address, resolved as IPv6
    destination: String,

    /// Control channel port of the server [default: from config, else 1337]
    #[arg(short, long, env = "ASCIICLIENT_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log protocol progress (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(receipt) => {
            tracing::info!(
                length = receipt.message_length,
                data_port = receipt.data_port,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<grnvs_net::Receipt, AppError> {
    if cli.message.is_empty() {
        return Err(AppError::EmptyMessage);
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let port = cli.port.unwrap_or(config.port);

    let client = grnvs_net::Client::new(config.session_config());
    let receipt = client
        .send_message(&cli.nick, &cli.destination, port, &cli.message)
        .await?;
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_nick_destination() {
        let cli = Cli::try_parse_from(["asciiclient", "-m", "hi", "alice", "::1"]).unwrap();
        assert_eq!(cli.message, "hi");
        assert_eq!(cli.nick, "alice");
        assert_eq!(cli.destination, "::1");
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_message_is_required() {
        assert!(Cli::try_parse_from(["asciiclient", "alice", "::1"]).is_err());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let cli = Cli::try_parse_from(["asciiclient", "-m", "", "alice", "::1"]).unwrap();
        assert!(matches!(run(cli).await, Err(AppError::EmptyMessage)));
    }
}
