//! `atem-monitor`: connects to a switcher and logs everything it reports.
//!
//! Usage:
//!
//! ```text
//! atem-monitor [CONFIG_PATH]
//! ```
//!
//! `CONFIG_PATH` defaults to `atem.toml`; a missing file means defaults.
//! `RUST_LOG` overrides the configured log level.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML file or defaults
//!  └─ UdpTransport::bind()     -- local socket
//!  └─ connect()                -- handshake + initial state dump
//!  └─ event loop
//!       ├─ Message / Connected -> log
//!       ├─ Closed              -> exit
//!       └─ Ctrl-C              -> disconnect, exit
//! ```

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use atem_client::application::connection::{connect, ConnectionEvent};
use atem_client::infrastructure::config::load_config;
use atem_client::infrastructure::network::udp::UdpTransport;
use atem_core::protocol::messages::ProductName;
use atem_core::CloseReason;

const DEFAULT_CONFIG_PATH: &str = "atem.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path).with_context(|| format!("loading {}", config_path.display()))?;

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)))
        .init();

    info!(config = %config_path.display(), "ATEM monitor starting");

    let switcher = config.switcher_addr()?;
    let transport = UdpTransport::bind(config.bind_addr()?).await?;
    let (handle, mut events) = connect(transport, switcher, config.connection_config())
        .await
        .with_context(|| format!("connecting to {switcher}"))?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ConnectionEvent::Message(Ok(message))) => {
                    if let Some(product) = message.downcast_ref::<ProductName>() {
                        info!(model = %product.name, "switcher identified");
                    }
                    info!(title = %message.title(), "{message:?}");
                }
                Some(ConnectionEvent::Message(Err(e))) => warn!(title = %e.title(), error = %e, "undecodable message"),
                Some(ConnectionEvent::Connected { session_id }) => {
                    info!(session_id = %format!("0x{session_id:04X}"), "initial state received");
                }
                Some(ConnectionEvent::Closed(CloseReason::Failed(e))) => {
                    return Err(e).context("session failed");
                }
                Some(ConnectionEvent::Closed(reason)) => {
                    info!(?reason, "session closed");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                handle.disconnect().await?;
                break;
            }
        }
    }

    info!("ATEM monitor stopped");
    Ok(())
}
