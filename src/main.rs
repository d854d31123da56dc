//! farewatch — Binary Entrypoint
//! One-shot run: load config, fetch fares, check thresholds, decide alerts,
//! notify. Scheduling is external (cron / CI schedule).
//!
//! See `README.md` for quickstart and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use farewatch::config::{default_config_path, load_config, validate_routes};
use farewatch::fetch::connectors::default_registry;
use farewatch::ledger::AlertLedger;
use farewatch::notify::telegram::TelegramNotifier;
use farewatch::notify::{ConsoleNotifier, Notifier};

const DEFAULT_STATE_PATH: &str = "state/alert_state.json";

#[derive(Debug, Parser)]
#[command(name = "farewatch", about = "Flight fare watcher and alert bot")]
struct Cli {
    /// Config file (TOML or JSON). Falls back to $FAREWATCH_CONFIG, then
    /// config/routes.toml, then config/routes.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alert ledger state file.
    #[arg(long, default_value = DEFAULT_STATE_PATH)]
    state: PathBuf,

    /// Print would-be alerts to stdout instead of sending them.
    /// DRY_RUN=1 in the environment does the same.
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("farewatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env for local runs; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let dry_run = cli.dry_run
        || std::env::var("DRY_RUN")
            .ok()
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let config_path = match cli.config {
        Some(p) => p,
        None => default_config_path()?,
    };
    let config = load_config(&config_path)?;
    tracing::info!(
        path = %config_path.display(),
        routes = config.routes.len(),
        dry_run,
        "configuration loaded"
    );

    let registry = default_registry(&config.settings);
    let known: Vec<String> = registry.keys().cloned().collect();
    validate_routes(&config.routes, &known).context("invalid route configuration")?;

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(ConsoleNotifier)
    } else {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN is required (or pass --dry-run)")?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .context("TELEGRAM_CHAT_ID is required (or pass --dry-run)")?;
        Arc::new(TelegramNotifier::new(token, chat_id))
    };

    let mut ledger = AlertLedger::load(
        &cli.state,
        config.settings.alert_cooldown_hours,
        config.settings.retention_days,
    );

    let report = farewatch::engine::run(
        &config.routes,
        &config.settings,
        &registry,
        &mut ledger,
        notifier.as_ref(),
    )
    .await?;

    tracing::info!(
        collected = report.collected,
        candidates = report.candidates,
        approved = report.approved.len(),
        suppressed = report.suppressed,
        notified = report.notified,
        "farewatch run finished"
    );
    Ok(())
}
