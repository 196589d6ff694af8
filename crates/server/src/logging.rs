// crates/server/src/logging.rs
//! Tracing subscriber setup: stdout always, plus an optional log file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: our crates at `level`, everything
/// else at `warn`.
pub fn default_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    format!(
        "warn,railvision={level},railvision_server={level},railvision_core={level},railvision_analysis={level},tower_http={level}"
    )
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process.
pub fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .with_context(|| format!("invalid LOG_LEVEL '{level}'"))?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_name = path
                .file_name()
                .with_context(|| format!("LOG_FILE {} does not name a file", path.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for level in ["info", "INFO", "debug", " warn "] {
            let directives = default_directives(level);
            assert!(EnvFilter::try_new(&directives).is_ok(), "{directives}");
        }
    }

    #[test]
    fn test_default_directives_scope_our_crates() {
        let directives = default_directives("DEBUG");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("railvision_core=debug"));
        assert!(directives.contains("railvision_analysis=debug"));
    }
}
