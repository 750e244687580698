use std::collections::BTreeMap;

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATE_TARGET: &str = "paygate";

/// Install the global subscriber and return the file writer guard, which
/// must live until shutdown.
///
/// `RUST_LOG` wins over the configured directives when set.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(config));

    let directives = filter_directives(&config.log_level, &config.log_targets);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // target kept so ledger and settlement lines can be split downstream
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

/// Base level, sqlx quietened, then one directive per configured module
///
/// Module keys are relative to the crate (`settlement`, `webhook`,
/// `ledger::primitives`); a key that already names the crate is kept as is.
pub fn filter_directives(base: &str, targets: &BTreeMap<String, String>) -> String {
    // sqlx logs every statement at info
    let mut directives = vec![base.to_string(), "sqlx=warn".to_string()];
    for (module, level) in targets {
        let target = if module == CRATE_TARGET || module.starts_with("paygate::") {
            module.clone()
        } else {
            format!("{}::{}", CRATE_TARGET, module)
        };
        directives.push(format!("{}={}", target, level));
    }
    directives.join(",")
}
