//! Process-wide `tracing` setup
//!
//! [`init_logging`] installs the subscriber once, before settings are known.
//! The returned [`LogHandle`] applies the configured level afterwards.
//! `RUST_LOG`, when set, takes precedence over both.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle to the installed filter
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogHandle {
    /// Switch to `level` ("info", "DEBUG", "warning", ...) unless `RUST_LOG` is set
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        if self.from_env {
            return Ok(());
        }
        let filter = EnvFilter::try_new(normalize_level(level))?;
        self.filter
            .reload(filter)
            .map_err(|e| anyhow::anyhow!("failed to update log level: {e}"))
    }
}

/// Install the global subscriber writing to stderr
///
/// A second call leaves the first subscriber in place; the returned handle
/// is then inert.
pub fn init_logging(default_level: &str) -> LogHandle {
    let (env_filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (
            EnvFilter::try_new(normalize_level(default_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
            false,
        ),
    };

    let (filter_layer, filter) = reload::Layer::new(env_filter);
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();

    LogHandle { filter, from_env }
}

/// Map level names from other logging conventions onto `tracing` directives
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}
