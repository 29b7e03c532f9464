pub mod activity;
pub mod config;
pub mod doctor;
pub mod indicator;
mod logging;
pub mod pty_session;
pub mod supervisor;
mod telemetry;
pub mod terminal;
pub mod terminal_restore;
pub mod tool_config;

pub(crate) use logging::logs_enabled;
pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub use telemetry::{init_tracing, tracing_log_path};
