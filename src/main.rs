use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use banbot::config::{Config, LoggingConfig};
use banbot::context::Context;
use banbot::coordinator::{ControlPlaneServer, PeerClient, PeerClientConfig, RoleCoordinator};
use banbot::platform::LogOnlyPlatform;

#[derive(Parser)]
#[command(
    name = "banbot",
    version,
    about = "Moderation bot with primary/secondary failover",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true, value_parser = ["text", "json"])]
    log_format: Option<String>,

    /// Load configuration from a TOML file instead of the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control plane and the peer health loop
    Serve,

    /// Query the /health endpoint of a running instance
    Status {
        /// Base URL of the instance
        #[arg(short, long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Load and validate configuration, then print the resolved role
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_format = cli.log_format.as_deref();

    match cli.command {
        Commands::Serve => {
            let config = load_config(cli.config.as_deref())?;
            setup_tracing(&config.logging, log_format, cli.verbose)?;
            serve(config).await?;
        }

        Commands::Status { url, timeout } => {
            let logging = Config::from_env()
                .map(|config| config.logging)
                .unwrap_or_default();
            setup_tracing(&logging, log_format, cli.verbose)?;
            tracing::debug!(url = %url, timeout = %timeout, "Querying instance health");
            status(url, timeout).await?;
        }

        Commands::CheckConfig => {
            let config = load_config(cli.config.as_deref())?;
            setup_tracing(&config.logging, log_format, cli.verbose)?;
            check_config(&config)?;
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, format: Option<&str>, verbose: bool) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => tracing_subscriber::EnvFilter::new(directives),
        _ => tracing_subscriber::EnvFilter::new(logging.filter_directives(verbose)),
    };

    match logging.effective_format(format) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };
    Ok(config)
}

async fn serve(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let ha = config.ha_config()?;

    if let Err(e) = banbot::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let platform = Arc::new(LogOnlyPlatform);
    let coordinator = Arc::new(RoleCoordinator::new(config.instance.role, platform.clone()));
    let context = Context::new(coordinator, ha.log_limits());

    // Handed to a gateway once one is attached
    let dispatcher = config.dispatcher(context.clone(), platform);
    tracing::info!(
        admins = config.discord.admin_users.len(),
        max_timeout_minutes = dispatcher.max_timeout_minutes(),
        "Command dispatch configured"
    );

    let server = ControlPlaneServer::new(context, ha).context("Failed to build control plane")?;
    tracing::info!("{}", server.info().display());

    server
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Control plane stopped with an error")?;

    tracing::info!("banbot stopped");
    Ok(())
}

async fn status(url: String, timeout: u64) -> Result<()> {
    let client = PeerClient::new(
        PeerClientConfig::new(url.as_str()).with_timeout(Duration::from_secs(timeout)),
    )?;

    let report = client
        .health()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    println!("Instance: {}", client.peer_url());
    println!("  Role: {}", report.role);
    println!("  Active: {}", report.is_active);
    println!("  Upstream connected: {}", report.upstream_connected);
    println!("  Last heartbeat: {}", report.last_heartbeat.to_rfc3339());
    println!("  Uptime: {:.0}s", report.uptime);
    println!("  Guilds: {}", report.guild_count);
    println!("  Custom commands: {}", report.custom_command_count);
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    println!("Configuration OK");
    println!("  Role: {}", config.instance.role);
    println!("  Port: {}", config.instance.port);
    println!(
        "  Peer: {}",
        config.instance.peer_url.as_deref().unwrap_or("(none)")
    );
    println!("  Admins: {}", config.discord.admin_users.len());
    println!("  Max timeout: {} days", config.moderation.max_timeout_days);
    println!("  Logging: {} ({})", config.logging.level, config.logging.format);
    println!(
        "  Heartbeat: {}s, takeover after {}s",
        config.ha.heartbeat_interval_secs, config.ha.takeover_grace_secs
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
