//! quill-server - HTTP API and background scheduler for Quillcast
//!
//! Serves the authoring API, exposes the cron endpoint for external
//! schedulers and, unless disabled, sweeps due scheduled posts itself.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libquillcast::logging::{LogFormat, LoggingConfig};
use libquillcast::{Config, QuillcastService};
use quill_server::{create_router, AppState};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "quill-server")]
#[command(version)]
#[command(about = "HTTP API and scheduled-post processor for Quillcast")]
#[command(long_about = "\
quill-server - HTTP API and scheduled-post processor for Quillcast

USAGE:
    # Serve the API with the built-in scheduler
    quill-server

    # Serve on a different address, let an external cron drive sweeps
    quill-server --bind 0.0.0.0:8080 --no-scheduler

    # Process due posts once and print the report
    quill-server --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes in-flight requests)

CONFIGURATION:
    Configuration file: ~/.config/quillcast/config.toml
    Environment overrides: QUILLCAST_DB_PATH, QUILLCAST_BIND_ADDR,
    CRON_SECRET, QUILLCAST_DEPLOYMENT_MODE, QUILLCAST_AI_KEY,
    QUILLCAST_HOSTED_AI_KEY
")]
struct Cli {
    /// Path to config file (defaults to the standard location)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to bind, overrides `server.bind_addr`
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    log_format: LogFormat,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,

    /// Do not run the built-in scheduler
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingConfig::new(cli.log_format, "info".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "quill-server exited with an error");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let bind_addr = cli.bind.clone().unwrap_or_else(|| config.server.bind_addr.clone());
    let poll_interval = config.scheduler.poll_interval()?;
    let scheduler_enabled = config.scheduler.enabled && !cli.no_scheduler;

    let service = Arc::new(QuillcastService::from_config(config).await?);

    if cli.once {
        let now = chrono::Utc::now().timestamp();
        let report = service.processor().sweep(now).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listen_for_signals(shutdown_tx));

    let scheduler = if scheduler_enabled {
        let processor = service.processor();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            processor.run(poll_interval, wait_for_shutdown(rx)).await;
        }))
    } else {
        info!("Built-in scheduler disabled");
        None
    };

    let app = create_router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "quill-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .context("Server error")?;

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    info!("quill-server stopped");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from_path(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load()?,
    };
    Ok(config)
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(unix)]
async fn listen_for_signals(tx: watch::Sender<bool>) {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            error!(error = %e, "Signal setup failed, graceful shutdown unavailable");
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!(signal, "Received shutdown signal, stopping gracefully");
        let _ = tx.send(true);
    }
    signals.handle().close();
}

#[cfg(not(unix))]
async fn listen_for_signals(tx: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, stopping gracefully");
        let _ = tx.send(true);
    }
}
