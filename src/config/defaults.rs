use std::env;
use std::path::PathBuf;

pub(super) const DEFAULT_INDICATOR_TIMEOUT_MS: u64 = 1000;
pub(super) const MIN_INDICATOR_TIMEOUT_MS: u64 = 50;
pub(super) const MAX_INDICATOR_TIMEOUT_MS: u64 = 10_000;
pub(super) const MAX_IDLE_THRESHOLD_MS: u64 = 600_000;

const CONFIG_DIR_NAME: &str = "configs";
const INDICATOR_BINARY_NAME: &str = "led";

/// Directory holding the installed binary; configs and the LED script live next to it.
pub fn install_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_dir() -> PathBuf {
    install_dir().join(CONFIG_DIR_NAME)
}

pub fn default_indicator_command() -> String {
    install_dir()
        .join(INDICATOR_BINARY_NAME)
        .to_string_lossy()
        .into_owned()
}
