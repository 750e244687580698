//! paygate - PIX / USDT settlement gateway
//!
//! ```text
//! providers ──▶ POST /webhooks/{provider} ──▶ normalizer ──▶ settlement ──▶ ledger
//! scheduler ──▶ POST /internal/jobs/*     ──▶ sweeper / yield / commissions
//! ```
//!
//! Flags:
//! - `--env <name>` / `-e <name>`: load `config/<name>.yaml` (default `dev`)
//! - `--port <port>`: override `gateway.port`
//! - `--init-schema`: apply `sql/schema.sql` before serving (PostgreSQL only)

use anyhow::Context;
use std::sync::Arc;

use paygate::config::AppConfig;
use paygate::db::Database;
use paygate::gateway::{self, rate_limit::DashMapRateLimitStore, state::AppState};
use paygate::store::{LedgerStore, MemoryStore, PgStore};

const SCHEMA_DDL: &str = include_str!("../sql/schema.sql");

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_init_schema() -> bool {
    std::env::args().any(|a| a == "--init-schema")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = paygate::logging::init_logging(&app_config);

    tracing::info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting paygate"
    );

    let store: Arc<dyn LedgerStore> = match app_config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            if use_init_schema() {
                db.apply_schema(SCHEMA_DDL)
                    .await
                    .context("Failed to apply ledger schema")?;
            }
            Arc::new(PgStore::new(&db))
        }
        None => {
            tracing::warn!("postgres_url not set, using the in-memory ledger store");
            Arc::new(MemoryStore::new())
        }
    };

    if app_config.internal_secret.is_none() {
        tracing::warn!("internal_secret not set, /internal/* routes are disabled");
    }

    let state = Arc::new(AppState::new(
        store,
        Arc::new(DashMapRateLimitStore::new()),
        &app_config,
    ));

    gateway::run_server(&app_config.gateway, state)
        .await
        .context("Gateway server error")?;

    tracing::info!("paygate stopped");
    Ok(())
}
