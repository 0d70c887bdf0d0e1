//! irc-notify - Main Entry Point
//!
//! Parses startup parameters, selects the notification backend for the
//! running platform and hands both to the connection supervisor.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use irc_notify::classifier::Classifier;
use irc_notify::config::{BridgeConfig, ConfigError, NotifierBackend, Overrides};
use irc_notify::error::{redact_credentials, BridgeError, BridgeResult};
use irc_notify::notify::select_notifier;
use irc_notify::observability::init_default_logging;
use irc_notify::supervisor::{ReconnectPolicy, Supervisor};
use irc_notify::transport::AmqpTransport;
use std::path::{Path, PathBuf};
use std::process;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Forward chat highlights from an AMQP broker to desktop notifications
#[derive(Parser)]
#[command(name = "irc-notify")]
#[command(about = "Forward chat highlights from an AMQP broker to desktop notifications")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Broker port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Broker user
    #[arg(short, long)]
    user: Option<String>,

    /// Broker password
    #[arg(short, long, env = "IRC_NOTIFY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Exchange to bind the queue to
    #[arg(short, long)]
    exchange: Option<String>,

    /// Queue to consume from
    #[arg(short, long)]
    queue: Option<String>,

    /// Notification backend
    #[arg(long, value_enum)]
    notifier: Option<NotifierBackend>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume highlights and show notifications (default)
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            exchange: self.exchange.clone(),
            queue: self.queue.clone(),
            notifier: self.notifier,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting irc-notify v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", redact_credentials(&e.to_string()));
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("{}", redact_credentials(&e.to_string()));
        process::exit(e.exit_code());
    }

    info!("Application shutdown complete");
}

fn load_configuration(cli: &Cli) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            BridgeConfig::load_from_file(path)?
        }
        None => {
            let default_paths = ["irc-notify.toml", "config/irc-notify.toml"];
            match default_paths.iter().map(Path::new).find(|path| path.exists()) {
                Some(path) => {
                    info!("Loading configuration from: {}", path.display());
                    BridgeConfig::load_from_file(path)?
                }
                None => BridgeConfig::default(),
            }
        }
    };

    config.apply_overrides(cli.overrides());
    config.validate()?;
    Ok(config)
}

async fn run_bridge(config: BridgeConfig) -> BridgeResult<()> {
    // Fail on an unsupported platform before touching the broker
    let notifier = select_notifier(&config.notify, std::env::consts::OS)?;
    info!("Using {} notifications", notifier.name());

    let descriptor = config.connection_descriptor()?;
    let transport = AmqpTransport::new(descriptor);

    let signals = ProcessSignals::install()
        .map_err(|e| BridgeError::internal(format!("cannot install signal handlers: {e}")))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        relay_signals(signals, shutdown_tx).await;
        warn!("Second interrupt received, exiting without waiting for teardown");
        process::exit(1);
    });

    let mut supervisor = Supervisor::new(
        transport,
        Classifier::new(),
        notifier,
        ReconnectPolicy::from(&config.reconnect),
    );
    supervisor.run(shutdown_rx).await?;
    Ok(())
}

/// Source of interrupt requests
#[async_trait]
trait SignalSource: Send {
    /// Wait for the next interrupt and name it
    async fn recv(&mut self) -> &'static str;
}

/// SIGINT and SIGTERM on Unix, Ctrl-C elsewhere
struct ProcessSignals {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ProcessSignals {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

#[async_trait]
impl SignalSource for ProcessSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    }
}

/// Request graceful shutdown on the first interrupt; return on the second
async fn relay_signals<S: SignalSource>(mut signals: S, shutdown: watch::Sender<bool>) {
    let name = signals.recv().await;
    info!("Received {}, shutting down gracefully...", name);
    let _ = shutdown.send(true);

    let name = signals.recv().await;
    info!("Received {} during shutdown", name);
}

fn handle_config_command(mut config: BridgeConfig, show: bool) -> BridgeResult<()> {
    if show {
        config.broker.password = "***".to_string();
        let rendered = toml::to_string_pretty(&config)
            .map_err(|e| BridgeError::internal(format!("cannot render configuration: {e}")))?;
        println!("Current configuration:");
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct ScriptedSignals {
        remaining: Vec<&'static str>,
    }

    #[async_trait]
    impl SignalSource for ScriptedSignals {
        async fn recv(&mut self) -> &'static str {
            match self.remaining.pop() {
                Some(name) => name,
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_requests_shutdown() {
        let (tx, rx) = watch::channel(false);
        let signals = ScriptedSignals {
            remaining: vec!["SIGINT"],
        };

        let relay = tokio::spawn(relay_signals(signals, tx));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(*rx.borrow());
        assert!(!relay.is_finished());
        relay.abort();
    }

    #[tokio::test]
    async fn test_second_interrupt_ends_relay() {
        let (tx, rx) = watch::channel(false);
        let signals = ScriptedSignals {
            remaining: vec!["SIGTERM", "SIGINT"],
        };

        tokio::time::timeout(Duration::from_secs(5), relay_signals(signals, tx))
            .await
            .unwrap();
        assert!(*rx.borrow());
    }
}
