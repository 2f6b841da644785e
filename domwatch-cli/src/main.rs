mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use domwatch_core::colors::CatppuccinExt;
use domwatch_core::config::{poll_once, watch_source, ConfigSource};
use domwatch_core::output::{get_formatter, OutputFormat};
use domwatch_core::validation::clean_domain_list;
use domwatch_core::{
    CheckOrchestrator, CheckTrigger, ConfigCoordinator, ConfigLayers, DomainStore, LiveConfig,
    NacosSource, PassReason, WhoisResolver,
};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "domwatch")]
#[command(about = "Domain expiry monitor - WHOIS-backed expiry checks with live configuration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local configuration file (TOML, or YAML for .yaml/.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format for check and config (human or json)
    #[arg(short, long, global = true, default_value = "human")]
    format: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until interrupted
    Run,
    /// Check domains once and print the results
    Check {
        /// Domains to check (defaults to the configured list)
        domains: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let layers = ConfigLayers::load(cli.config.as_deref()).context("failed to load configuration")?;
    let initial = layers.build(None).context("invalid configuration")?;

    init_tracing(&initial.log_level, cli.json);

    let output_format: OutputFormat = cli.format.parse().unwrap_or_default();

    match cli.command {
        Commands::Run => run(layers, initial).await,
        Commands::Check { domains } => check(initial, domains, output_format).await,
        Commands::Config => {
            println!("{}", get_formatter(output_format).format_config(&initial));
            Ok(())
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(layers: ConfigLayers, initial: LiveConfig) -> anyhow::Result<()> {
    let store = Arc::new(DomainStore::new());
    let trigger = CheckTrigger::new();
    let coordinator = Arc::new(
        ConfigCoordinator::with_initial(layers, initial)
            .with_store(store.clone())
            .with_trigger(trigger.clone()),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = NacosSource::from_settings(&coordinator.current().source)
        .context("failed to set up configuration source")?;
    let watcher = match source {
        Some(source) => {
            let source: Arc<dyn ConfigSource> = Arc::new(source);
            poll_once(source.as_ref(), &coordinator).await;
            Some(tokio::spawn(watch_source(
                source,
                coordinator.clone(),
                shutdown_rx.clone(),
            )))
        }
        None => {
            info!("No configuration source configured, using local configuration only");
            None
        }
    };

    let mut updates = Box::pin(coordinator.updates());
    tokio::spawn(async move {
        while let Some(config) = updates.next().await {
            info!(
                domains = config.domains.len(),
                execution = %config.execution,
                "Configuration updated"
            );
        }
    });

    let orchestrator = Arc::new(CheckOrchestrator::new(
        coordinator.clone(),
        Arc::new(WhoisResolver::default()),
        store,
        trigger,
    ));
    let checks = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { orchestrator.run_forever(shutdown).await })
    };

    let signal = wait_for_shutdown().await?;
    info!(signal, "Shutting down");
    if shutdown_tx.send(true).is_err() {
        warn!("All shutdown receivers already gone");
    }

    checks.await.context("check loop panicked")?;
    if let Some(watcher) = watcher {
        watcher.await.context("configuration watch panicked")?;
    }
    Ok(())
}

async fn check(mut config: LiveConfig, domains: Vec<String>, format: OutputFormat) -> anyhow::Result<()> {
    if !domains.is_empty() {
        config.domains = clean_domain_list(&domains);
    }
    if config.domains.is_empty() {
        eprintln!(
            "{} No domains given. Pass them as arguments or set DOMAINS / the config file",
            "Error:".ctp_red()
        );
        std::process::exit(1);
    }

    let store = Arc::new(DomainStore::new());
    let coordinator = Arc::new(ConfigCoordinator::with_initial(ConfigLayers::default(), config));
    let orchestrator = CheckOrchestrator::new(
        coordinator,
        Arc::new(WhoisResolver::default()),
        store.clone(),
        CheckTrigger::new(),
    );

    let spinner = display::Spinner::new("Checking domain expiry...");
    let summary = orchestrator.run_pass(PassReason::Startup).await;
    spinner.finish();

    println!("{}", get_formatter(format).format_records(&store.snapshot()));

    if summary.invalid > 0 {
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    Ok("SIGINT")
}
