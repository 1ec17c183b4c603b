//! Default paths for stagehand components
//!
//! User-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/stagehand/stagehandd.sock` or `/tmp/stagehand-$USER/stagehandd.sock`
//! - Config: `$XDG_CONFIG_HOME/stagehand/config.toml` or `~/.config/stagehand/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const STAGEHAND_SOCKET_ENV: &str = "STAGEHAND_SOCKET";

/// Socket filename within the socket directory
const SOCKET_FILENAME: &str = "stagehandd.sock";

/// Application subdirectory name
const APP_DIR: &str = "stagehand";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$STAGEHAND_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/stagehand/stagehandd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/stagehand-$USER/stagehandd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(STAGEHAND_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking STAGEHAND_SOCKET env var.
/// Used for config defaults where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/stagehand/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/stagehand/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}
