//! TOML settings file.
//!
//! Every field is optional. Fields present in the file override the
//! corresponding [`BridgeOptions`] value; `env` entries are merged in.
//!
//! ```toml
//! codex_bin = "/opt/codex/bin/codex"
//! cwd = "/work/project"
//! auto_initialize = true
//! reject_on_write_failure = false
//! event_capacity = 1024
//!
//! [env]
//! RUST_LOG = "info"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{BridgeOptions, user_config_path};
use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSettings {
    pub codex_bin: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub auto_initialize: Option<bool>,
    pub reject_on_write_failure: Option<bool>,
    pub event_capacity: Option<usize>,
}

impl BridgeSettings {
    /// Parse and validate settings from TOML text.
    pub fn parse(contents: &str) -> BridgeResult<Self> {
        let settings: BridgeSettings = toml::from_str(contents)
            .map_err(|e| BridgeError::config(format!("failed to parse settings: {}", e)))?;

        if settings.event_capacity == Some(0) {
            return Err(BridgeError::config("event_capacity must be at least 1"));
        }
        Ok(settings)
    }

    /// Layer these settings over `options`.
    pub fn apply(&self, mut options: BridgeOptions) -> BridgeOptions {
        if let Some(codex_bin) = &self.codex_bin {
            options.codex_bin = codex_bin.clone();
        }
        if let Some(cwd) = &self.cwd {
            options.cwd = Some(cwd.clone());
        }
        options
            .env
            .extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(enabled) = self.auto_initialize {
            options.auto_initialize = enabled;
        }
        if let Some(enabled) = self.reject_on_write_failure {
            options.reject_on_write_failure = enabled;
        }
        if let Some(capacity) = self.event_capacity {
            options.event_capacity = capacity;
        }
        options
    }
}

/// Load settings from a file that must exist.
pub fn load_settings_file(path: &Path) -> BridgeResult<BridgeSettings> {
    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let settings = BridgeSettings::parse(&contents)
        .map_err(|e| BridgeError::config(format!("{}: {}", path.display(), e)))?;
    log::info!(
        target: "app_server_bridge::config",
        "Loaded settings from {}",
        path.display()
    );
    Ok(settings)
}

/// Load settings from `explicit`, or from the user config file if present.
///
/// An explicit path must exist. A missing user config file yields defaults.
pub fn load_settings(explicit: Option<&Path>) -> BridgeResult<BridgeSettings> {
    if let Some(path) = explicit {
        return load_settings_file(path);
    }

    match user_config_path() {
        Some(path) if path.exists() => load_settings_file(&path),
        Some(path) => {
            log::debug!(
                target: "app_server_bridge::config",
                "No user settings at {}, using defaults",
                path.display()
            );
            Ok(BridgeSettings::default())
        }
        None => Ok(BridgeSettings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(BridgeSettings::parse("").unwrap(), BridgeSettings::default());
    }

    #[test]
    fn parses_every_field() {
        let settings = BridgeSettings::parse(
            r#"
            codex_bin = "/opt/codex"
            cwd = "/work"
            auto_initialize = false
            reject_on_write_failure = true
            event_capacity = 16

            [env]
            FOO = "bar"
            "#,
        )
        .unwrap();

        assert_eq!(settings.codex_bin, Some(PathBuf::from("/opt/codex")));
        assert_eq!(settings.cwd, Some(PathBuf::from("/work")));
        assert_eq!(settings.auto_initialize, Some(false));
        assert_eq!(settings.reject_on_write_failure, Some(true));
        assert_eq!(settings.event_capacity, Some(16));
        assert_eq!(settings.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BridgeSettings::parse("codex_binary = \"x\"").unwrap_err();
        assert!(matches!(err, BridgeError::Config { .. }), "{:?}", err);
    }

    #[test]
    fn zero_event_capacity_is_rejected() {
        let err = BridgeSettings::parse("event_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("event_capacity"), "{}", err);
    }

    #[test]
    fn apply_overrides_only_present_fields() {
        let base = BridgeOptions::new()
            .codex_bin("/from/options")
            .env("KEEP", "1")
            .env("SHARED", "options");
        let settings = BridgeSettings {
            cwd: Some(PathBuf::from("/from/file")),
            env: HashMap::from([("SHARED".to_string(), "file".to_string())]),
            auto_initialize: Some(false),
            ..Default::default()
        };

        let options = settings.apply(base);
        assert_eq!(options.codex_bin, PathBuf::from("/from/options"));
        assert_eq!(options.cwd, Some(PathBuf::from("/from/file")));
        assert_eq!(options.env.get("KEEP").map(String::as_str), Some("1"));
        assert_eq!(options.env.get("SHARED").map(String::as_str), Some("file"));
        assert!(!options.auto_initialize);
        assert!(!options.reject_on_write_failure);
    }

    #[test]
    fn load_settings_file_reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "codex_bin = \"/explicit\"").unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.codex_bin, Some(PathBuf::from("/explicit")));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, BridgeError::Config { .. }));
    }
}
