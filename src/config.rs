pub mod settings;
pub mod user;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::DEFAULT_EVENT_CAPACITY;

pub use settings::{BridgeSettings, load_settings, load_settings_file};
pub use user::user_config_path;

/// Environment variable naming the app server executable.
pub const CODEX_BIN_ENV: &str = "CODEX_BIN";

/// Executable used when neither options nor `CODEX_BIN` name one.
pub const DEFAULT_CODEX_BIN: &str = "codex";

/// Direction of a traffic line handed to the [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDirection {
    /// A stdout line from the app server.
    Inbound,
    /// A serialized message written to the app server.
    Outbound,
    /// A stderr line from the app server.
    Stderr,
}

impl LogDirection {
    /// Human readable prefix used by the default logger.
    pub fn prefix(self) -> &'static str {
        match self {
            LogDirection::Inbound => "\u{2190} codex",
            LogDirection::Outbound => "codex \u{2192}",
            LogDirection::Stderr => "codex stderr",
        }
    }
}

/// Diagnostic sink for raw traffic.
pub type Logger = Arc<dyn Fn(LogDirection, &str) + Send + Sync>;

/// Logger writing every line to the debug log with its directional prefix.
pub fn default_logger() -> Logger {
    Arc::new(|direction: LogDirection, line: &str| {
        log::debug!(
            target: "app_server_bridge::traffic",
            "{} {}",
            direction.prefix(),
            line
        );
    })
}

/// Resolve the executable from an optional `CODEX_BIN` value.
fn codex_bin_from(env_value: Option<String>) -> PathBuf {
    env_value
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CODEX_BIN))
}

/// Options controlling how the bridge spawns and talks to the app server.
#[derive(Clone)]
pub struct BridgeOptions {
    /// Executable to spawn with the `app-server` argument.
    pub codex_bin: PathBuf,
    /// Working directory of the child. `None` inherits ours.
    pub cwd: Option<PathBuf>,
    /// Variables layered over the inherited environment. These win.
    pub env: HashMap<String, String>,
    pub logger: Logger,
    /// Send `initialize` from `start()` and wait for its reply.
    pub auto_initialize: bool,
    /// On a stdin write error, reject the affected request instead of
    /// leaving it pending.
    pub reject_on_write_failure: bool,
    /// Events buffered per subscriber before the slowest one starts lagging.
    pub event_capacity: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            codex_bin: codex_bin_from(std::env::var(CODEX_BIN_ENV).ok()),
            cwd: None,
            env: HashMap::new(),
            logger: default_logger(),
            auto_initialize: true,
            reject_on_write_failure: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codex_bin(mut self, codex_bin: impl Into<PathBuf>) -> Self {
        self.codex_bin = codex_bin.into();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(LogDirection, &str) + Send + Sync + 'static,
    {
        self.logger = Arc::new(logger);
        self
    }

    pub fn auto_initialize(mut self, enabled: bool) -> Self {
        self.auto_initialize = enabled;
        self
    }

    pub fn reject_on_write_failure(mut self, enabled: bool) -> Self {
        self.reject_on_write_failure = enabled;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl fmt::Debug for BridgeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeOptions")
            .field("codex_bin", &self.codex_bin)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("logger", &"<fn>")
            .field("auto_initialize", &self.auto_initialize)
            .field("reject_on_write_failure", &self.reject_on_write_failure)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_bin_falls_back_to_codex() {
        assert_eq!(codex_bin_from(None), PathBuf::from("codex"));
        assert_eq!(codex_bin_from(Some(String::new())), PathBuf::from("codex"));
        assert_eq!(
            codex_bin_from(Some("/opt/codex/bin/codex".to_string())),
            PathBuf::from("/opt/codex/bin/codex")
        );
    }

    #[test]
    fn defaults_auto_initialize_and_keep_pending_on_write_failure() {
        let options = BridgeOptions::new();
        assert!(options.auto_initialize);
        assert!(!options.reject_on_write_failure);
        assert_eq!(options.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert!(options.cwd.is_none());
        assert!(options.env.is_empty());
    }

    #[test]
    fn builder_overrides_fields() {
        let options = BridgeOptions::new()
            .codex_bin("/bin/fake")
            .cwd("/tmp")
            .env("A", "1")
            .envs([("B", "2"), ("A", "3")])
            .auto_initialize(false)
            .reject_on_write_failure(true)
            .event_capacity(4);

        assert_eq!(options.codex_bin, PathBuf::from("/bin/fake"));
        assert_eq!(options.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(options.env.get("A").map(String::as_str), Some("3"));
        assert_eq!(options.env.get("B").map(String::as_str), Some("2"));
        assert!(!options.auto_initialize);
        assert!(options.reject_on_write_failure);
        assert_eq!(options.event_capacity, 4);
    }

    #[test]
    fn log_prefixes_show_direction() {
        assert_eq!(LogDirection::Inbound.prefix(), "← codex");
        assert_eq!(LogDirection::Outbound.prefix(), "codex →");
        assert_eq!(LogDirection::Stderr.prefix(), "codex stderr");
    }

    #[test]
    fn debug_output_hides_logger() {
        let debug = format!("{:?}", BridgeOptions::new().codex_bin("x"));
        assert!(debug.contains("<fn>"), "{}", debug);
        assert!(debug.contains("\"x\""), "{}", debug);
    }
}
