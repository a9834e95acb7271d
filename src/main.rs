//! Pingwatch Binary Entry Point
//!
//! Runs the headless monitor: probes the configured targets, logs a latency
//! summary every drain cycle and accepts console commands on stdin.
//! Core functionality is provided by the `pingwatch` library crate.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pingwatch::{
    ConsoleCommand, DrainLoop, ExportHook, IcmpProbe, JsonExporter, LogRenderer, Probe,
    ProbeError, ProberRegistry, RenderHook, SeriesStore, TcpProbe,
    config::{AppConfig, ProbeConfig, parse_duration},
    parse_targets,
    probe::DEFAULT_TCP_PORT,
    sample_channel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pingwatch - Continuous Multi-Target Latency Monitor
#[derive(Parser, Debug)]
#[command(name = "pingwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PINGWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Targets to probe, comma-separated (added to the config file targets)
    #[arg(short, long, env = "PINGWATCH_TARGETS")]
    targets: Option<String>,

    /// Probe transport (overrides config file)
    #[arg(long, value_enum, env = "PINGWATCH_PROBE")]
    probe: Option<ProbeKind>,

    /// Port for TCP probes (overrides config file)
    #[arg(long, env = "PINGWATCH_PORT")]
    port: Option<u16>,

    /// Probe interval, e.g. `1s` (overrides config file)
    #[arg(long, value_parser = parse_duration, env = "PINGWATCH_INTERVAL")]
    interval: Option<Duration>,

    /// Probe timeout, e.g. `800ms` (overrides config file)
    #[arg(long, value_parser = parse_duration, env = "PINGWATCH_TIMEOUT")]
    timeout: Option<Duration>,

    /// Directory for exports (overrides config file)
    #[arg(long, env = "PINGWATCH_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Export all series when exiting
    #[arg(long)]
    export_on_exit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProbeKind {
    Icmp,
    Tcp,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pingwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let mut targets = config.targets()?;
    if let Some(raw) = &cli.targets {
        for target in parse_targets(raw) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    let probe = build_probe(&config.probe)?;
    tracing::info!(
        probe = probe.kind(),
        interval = ?config.monitor.interval,
        timeout = ?config.monitor.timeout,
        targets = targets.len(),
        "Pingwatch starting"
    );

    let (sink, receiver) = sample_channel();
    let registry = ProberRegistry::new(probe, sink, config.prober_settings());
    let mut drain = DrainLoop::new(receiver, LogRenderer::new());
    let exporter = JsonExporter;

    registry.start_all(targets).await;
    tracing::info!(
        "Type hosts to start probing, or: stop <hosts>, stop-all, status, export [path], quit"
    );

    let mut ticker = tokio::time::interval(config.monitor.drain_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                drain.drain_once();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let Some(command) = ConsoleCommand::parse(&line) else {
                        continue;
                    };
                    let flow = handle_command(
                        command,
                        &registry,
                        drain.store(),
                        &exporter,
                        &config.export.dir,
                    )
                    .await;
                    if flow.is_break() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("Console input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read console input");
                    stdin_open = false;
                }
            }
        }
    }

    tracing::info!("Shutting down probers...");
    registry.stop_all().await;
    if !registry.shutdown().await {
        tracing::warn!("Some probers did not exit in time");
    }
    drain.drain_once();

    if cli.export_on_exit {
        export(&exporter, drain.store(), None, &config.export.dir);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Apply CLI/env overrides (CLI > ENV > config file).
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(interval) = cli.interval {
        config.monitor.interval = interval;
    }
    if let Some(timeout) = cli.timeout {
        config.monitor.timeout = timeout;
    }
    if let Some(dir) = &cli.export_dir {
        config.export.dir = dir.clone();
    }

    let current_port = match config.probe {
        ProbeConfig::Tcp { port } => Some(port),
        ProbeConfig::Icmp => None,
    };
    match (cli.probe, cli.port) {
        (Some(ProbeKind::Icmp), _) => config.probe = ProbeConfig::Icmp,
        (Some(ProbeKind::Tcp), port) => {
            config.probe = ProbeConfig::Tcp {
                port: port.or(current_port).unwrap_or(DEFAULT_TCP_PORT),
            }
        }
        (None, Some(port)) if current_port.is_some() => config.probe = ProbeConfig::Tcp { port },
        (None, Some(_)) => tracing::warn!("--port only applies to TCP probes, ignoring"),
        (None, None) => {}
    }
}

fn build_probe(config: &ProbeConfig) -> Result<Arc<dyn Probe>, ProbeError> {
    let probe: Arc<dyn Probe> = match config {
        ProbeConfig::Icmp => Arc::new(IcmpProbe::new()?),
        ProbeConfig::Tcp { port } => Arc::new(TcpProbe::new(*port)),
    };
    Ok(probe)
}

async fn handle_command(
    command: ConsoleCommand,
    registry: &ProberRegistry,
    store: &SeriesStore,
    exporter: &impl ExportHook,
    export_dir: &Path,
) -> ControlFlow<()> {
    match command {
        ConsoleCommand::Start(targets) => {
            registry.start_all(targets).await;
        }
        ConsoleCommand::Stop(targets) => {
            for target in targets {
                if !registry.stop(target.as_str()).await {
                    tracing::info!(host = %target, "Target is not being probed");
                }
            }
        }
        ConsoleCommand::StopAll => {
            registry.stop_all().await;
        }
        ConsoleCommand::Status => {
            for info in registry.list().await {
                tracing::info!(
                    host = %info.target,
                    generation = info.generation,
                    since = %info.started_at,
                    "Prober running"
                );
            }
            LogRenderer::new().render(store);
        }
        ConsoleCommand::Export(path) => export(exporter, store, path, export_dir),
        ConsoleCommand::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

fn export(exporter: &impl ExportHook, store: &SeriesStore, path: Option<PathBuf>, dir: &Path) {
    let path = path.unwrap_or_else(|| exporter.default_path(dir));
    if let Err(e) = exporter.export(store, &path) {
        tracing::error!(path = %path.display(), error = %e, "Export failed");
    }
}

/// Resolve when Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
