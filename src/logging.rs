//! Opt-in debug log on disk. The terminal belongs to the child, so nothing is ever
//! printed there.
//!
//! Lines that quote child output (matched window text, panic payloads) are only written
//! when `--log-content` is on as well.

use crate::config::AppConfig;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const DEBUG_LOG_LIMIT: u64 = 2 * 1024 * 1024;
const CRASH_LOG_LIMIT: u64 = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Verbosity {
    Off = 0,
    Metadata = 1,
    Content = 2,
}

impl Verbosity {
    fn for_config(config: &AppConfig) -> Self {
        match (logs_enabled(config), config.log_content) {
            (false, _) => Verbosity::Off,
            (true, false) => Verbosity::Metadata,
            (true, true) => Verbosity::Content,
        }
    }

    fn current() -> Self {
        match VERBOSITY.load(Ordering::Relaxed) {
            2 => Verbosity::Content,
            1 => Verbosity::Metadata,
            _ => Verbosity::Off,
        }
    }
}

static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Off as u8);
static DEBUG_LOG: OnceLock<Mutex<Option<CappedLog>>> = OnceLock::new();

pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("statuslight.log")
}

/// Panic records: location and version, plus the payload at content verbosity.
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("statuslight_crash.log")
}

pub(crate) fn logs_enabled(config: &AppConfig) -> bool {
    config.logs && !config.no_logs
}

/// Append-only file that starts over once it would grow past `limit`.
struct CappedLog {
    path: PathBuf,
    file: File,
    limit: u64,
    size: u64,
}

impl CappedLog {
    fn open(path: &Path, limit: u64) -> Option<Self> {
        let mut size = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
        if size > limit {
            let _ = fs::remove_file(path);
            size = 0;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            file,
            limit,
            size,
        })
    }

    fn append(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.size.saturating_add(len) > self.limit {
            match File::create(&self.path) {
                Ok(file) => {
                    self.file = file;
                    self.size = 0;
                }
                Err(_) => return,
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.size = self.size.saturating_add(len);
        }
    }
}

fn debug_log() -> &'static Mutex<Option<CappedLog>> {
    DEBUG_LOG.get_or_init(|| Mutex::new(None))
}

fn set_verbosity(verbosity: Verbosity) {
    VERBOSITY.store(verbosity as u8, Ordering::Relaxed);
    let mut log = debug_log()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *log = match verbosity {
        Verbosity::Off => None,
        _ => CappedLog::open(&log_file_path(), DEBUG_LOG_LIMIT),
    };
}

/// Apply `--logs`, `--no-logs` and `--log-content`.
pub fn init_logging(config: &AppConfig) {
    set_verbosity(Verbosity::for_config(config));
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

pub fn log_debug(msg: &str) {
    if Verbosity::current() < Verbosity::Metadata {
        return;
    }
    let mut log = debug_log()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(log) = log.as_mut() {
        log.append(&format!("[{}] {msg}\n", epoch_millis()));
    }
}

/// Like [`log_debug`], for messages that quote child output.
pub fn log_debug_content(msg: &str) {
    if Verbosity::current() == Verbosity::Content {
        log_debug(msg);
    }
}

pub fn log_panic(info: &PanicHookInfo<'_>) {
    let verbosity = Verbosity::current();
    if verbosity == Verbosity::Off {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown location".to_string());
    let payload = if verbosity == Verbosity::Content {
        info.payload()
            .downcast_ref::<&str>()
            .map(|text| text.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_string())
    } else {
        "payload withheld".to_string()
    };
    if let Some(mut log) = CappedLog::open(&crash_log_path(), CRASH_LOG_LIMIT) {
        log.append(&format!(
            "[{}] statuslight {} panicked at {location}: {payload}\n",
            epoch_millis(),
            env!("CARGO_PKG_VERSION")
        ));
    }
}
