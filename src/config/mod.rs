//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;

use defaults::DEFAULT_INDICATOR_TIMEOUT_MS;
pub use defaults::{default_config_dir, default_indicator_command, install_dir};

/// CLI options for statuslight. Everything after the first positional belongs to the child.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "statuslight",
    about = "Statuslight: mirror a CLI's activity on an RGB LED",
    author,
    version,
    trailing_var_arg = true
)]
pub struct AppConfig {
    /// Directory holding <tool>.yaml and default.yaml pattern files
    #[arg(long = "config-dir", env = "STATUSLIGHT_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Indicator command (split with shell rules; defaults to `led` next to the binary)
    #[arg(long = "indicator", env = "STATUSLIGHT_INDICATOR", value_name = "CMD")]
    pub indicator: Option<String>,

    /// Selector byte inserted after the mode flag (for multi-LED devices)
    #[arg(long = "indicator-selector", value_name = "N")]
    pub indicator_selector: Option<u8>,

    /// Kill the indicator command if it runs longer than this (milliseconds)
    #[arg(long = "indicator-timeout-ms", default_value_t = DEFAULT_INDICATOR_TIMEOUT_MS)]
    pub indicator_timeout_ms: u64,

    /// Run without driving the indicator
    #[arg(long = "no-indicator", default_value_t = false)]
    pub no_indicator: bool,

    /// Override the idle threshold from the tool config (milliseconds)
    #[arg(long = "idle-threshold-ms", value_name = "MS")]
    pub idle_threshold_ms: Option<u64>,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "STATUSLIGHT_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "STATUSLIGHT_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging matched output snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "STATUSLIGHT_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Print environment diagnostics and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,

    /// Command to supervise, followed by its arguments
    #[arg(value_name = "COMMAND", num_args = 0..)]
    pub command: Vec<String>,
}

/// How to invoke the indicator, resolved from the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSettings {
    pub program: String,
    pub leading_args: Vec<String>,
    pub selector: Option<u8>,
    pub timeout_ms: u64,
}
