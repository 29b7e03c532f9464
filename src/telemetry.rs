//! Structured trace output: indicator transitions and session summaries as JSON lines.

use crate::config::AppConfig;
use crate::log_debug;
use crate::logging::logs_enabled;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

const TRACE_LOG_ENV: &str = "STATUSLIGHT_TRACE_LOG";
const TRACE_LOG_NAME: &str = "statuslight_trace.jsonl";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// `STATUSLIGHT_TRACE_LOG` if set, else a file in the temp dir.
pub fn tracing_log_path() -> PathBuf {
    env::var_os(TRACE_LOG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join(TRACE_LOG_NAME))
}

/// Install the JSON subscriber once, and only when file logging is on.
pub fn init_tracing(config: &AppConfig) {
    if !logs_enabled(config) {
        return;
    }

    TRACING_INIT.get_or_init(|| {
        let path = tracing_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(err) => {
                log_debug(&format!("trace log {} unavailable: {err}", path.display()));
                return;
            }
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            log_debug("a tracing subscriber was already installed");
        }
    });
}
