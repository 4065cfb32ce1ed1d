//! User configuration location for app-server-bridge.
//!
//! User config location: $XDG_CONFIG_HOME/app-server-bridge/app-server-bridge.toml
//! Fallback: the platform config directory (e.g. ~/.config on Linux)

use std::path::{Path, PathBuf};

const APP_DIR: &str = "app-server-bridge";
const FILE_NAME: &str = "app-server-bridge.toml";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/app-server-bridge/app-server-bridge.toml
/// 2. Otherwise: `dirs::config_dir()`/app-server-bridge/app-server-bridge.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let xdg = std::env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty());
    let base = xdg.map(PathBuf::from).or_else(dirs::config_dir)?;
    Some(config_file_in(&base))
}

fn config_file_in(base: &Path) -> PathBuf {
    base.join(APP_DIR).join(FILE_NAME)
}
