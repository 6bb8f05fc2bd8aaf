//! Standard configuration locations

use std::path::PathBuf;

/// Platform config directory for stemscope
///
/// `~/.config/stemscope` on Linux, `~/Library/Application Support/stemscope`
/// on macOS, `%APPDATA%\stemscope` on Windows; `./stemscope` when the
/// platform has none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemscope")
}

/// `config.yaml` inside [`config_dir`]
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}
