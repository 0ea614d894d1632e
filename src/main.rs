//! SCR Ops - Main Entry Point
//!
//! Operator console for solar-panel cleaning robot fleets.

mod cli;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use scr_ops::constants::LOG_FILE_PREFIX;
use scr_ops::helpers::get_or_create_data_dir;
use scr_ops::{AppConfig, ServiceHub};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let _guard = init_tracing();

    let config = load_config(&args)?;
    tracing::info!(backend = %config.backend_url, "Starting SCR Ops");

    let hub = ServiceHub::new(config)?;
    cli::run(&hub, args.command).await
}

/// Stderr plus a daily file in the data directory; falls back to stderr only
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match get_or_create_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339());
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(file)
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            tracing::warn!("File logging disabled: {e}");
            None
        }
    }
}

fn load_config(args: &Cli) -> anyhow::Result<AppConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_or_init(&path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(url) = &args.backend_url {
        config.backend_url = url.trim().to_string();
    }
    config.validate()?;
    Ok(config)
}
