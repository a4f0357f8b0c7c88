//! snooze daemon
//!
//! Stops game servers nobody is playing on and wakes them up again when a
//! player tries to join.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snooze_core::config::{self, DaemonConfig};
use snooze_daemon::{DaemonState, PanelClient, Reconciler};

#[derive(Parser)]
#[command(name = "snooze")]
#[command(about = "Stops idle game servers and wakes them on connect")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SNOOZE_CONFIG")]
    config: Option<PathBuf>,

    /// Panel API base URL
    #[arg(long, env = "SNOOZE_API_URL")]
    api_url: Option<String>,

    /// Panel user
    #[arg(long, env = "SNOOZE_USERNAME")]
    username: Option<String>,

    /// Panel password
    #[arg(long, env = "SNOOZE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Host the decoy listeners bind to
    #[arg(long, env = "SNOOZE_HOST")]
    host: Option<String>,

    /// UTC offset for idle calculations, e.g. -03:00
    #[arg(long, env = "SNOOZE_UTC_OFFSET", allow_hyphen_values = true)]
    utc_offset: Option<String>,

    /// Minutes without players before a server is stopped
    #[arg(long, env = "SNOOZE_INACTIVE_MINUTES")]
    inactive_minutes: Option<u64>,

    /// Seconds between checks
    #[arg(long, env = "SNOOZE_CHECK_INTERVAL")]
    check_interval: Option<u64>,

    /// Accept self-signed panel certificates
    #[arg(long, env = "SNOOZE_ACCEPT_INVALID_CERTS")]
    accept_invalid_certs: Option<bool>,

    /// MOTD shown while a server sleeps
    #[arg(long, env = "SNOOZE_MOTD")]
    motd: Option<String>,

    /// Kick message for the player who woke a server
    #[arg(long, env = "SNOOZE_DISCONNECT_MESSAGE")]
    disconnect_message: Option<String>,

    /// Version name advertised by the decoys
    #[arg(long, env = "SNOOZE_SERVER_VERSION")]
    server_version: Option<String>,

    /// Protocol number advertised by the decoys
    #[arg(long, env = "SNOOZE_PROTOCOL_VERSION")]
    protocol_version: Option<i32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Flags and environment win over the config file
    fn apply_overrides(self, config: &mut DaemonConfig) {
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(host) = self.host {
            config.bind_host = host;
        }
        if let Some(utc_offset) = self.utc_offset {
            config.utc_offset = utc_offset;
        }
        if let Some(minutes) = self.inactive_minutes {
            config.inactive_minutes = minutes;
        }
        if let Some(secs) = self.check_interval {
            config.check_interval = std::time::Duration::from_secs(secs);
        }
        if let Some(accept) = self.accept_invalid_certs {
            config.accept_invalid_certs = accept;
        }
        if let Some(motd) = self.motd {
            config.decoy.motd = motd;
        }
        if let Some(message) = self.disconnect_message {
            config.decoy.disconnect_message = message;
        }
        if let Some(version) = self.server_version {
            config.decoy.version_name = version;
        }
        if let Some(protocol) = self.protocol_version {
            config.decoy.protocol_version = protocol;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("snooze starting...");

    // Load configuration
    let mut config: DaemonConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path)
                .with_context(|| format!("Failed to load config from {:?}", default_path))?
        } else {
            tracing::info!("No config file, using defaults and environment");
            DaemonConfig::default()
        }
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;
    tracing::debug!("Configuration: {:?}", config);

    let panel = Arc::new(PanelClient::from_config(&config)?);

    // Not fatal; every request logs in again on 401/403
    if let Err(e) = panel.login().await {
        tracing::warn!("Initial login failed, will retry on the first check: {}", e);
    }

    let state = Arc::new(DaemonState::new(config, panel)?);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let (reconciler, wake_rx) = Reconciler::new(Arc::clone(&state), cancel.clone());
    reconciler.run(wake_rx).await;

    tracing::info!("snooze shutdown complete");
    Ok(())
}
