use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::{
    io, panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        OnceLock,
    },
};

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// RAII guard that puts the real terminal back into cooked mode on drop
/// (and on panic via a shared hook).
///
/// Starts inactive; raw mode is only entered when asked for, so building a guard in a
/// non-interactive run is harmless.
pub struct TerminalModeGuard {
    raw_mode_used: bool,
}

impl TerminalModeGuard {
    pub fn inactive() -> Self {
        install_terminal_panic_hook();
        Self {
            raw_mode_used: false,
        }
    }

    pub fn enable_raw_mode(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
        self.raw_mode_used = true;
        Ok(())
    }

    /// Whether this guard ever switched the terminal to raw mode.
    pub fn raw_mode_used(&self) -> bool {
        self.raw_mode_used
    }

    pub fn restore(&self) {
        restore_terminal();
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Leave raw mode if any guard entered it. Safe to call more than once.
pub fn restore_terminal() {
    if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = disable_raw_mode();
    }
}

pub fn install_terminal_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            crate::log_panic(info);
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".to_string());
            crate::log_debug(&format!("panic at {location}"));
            crate::log_debug_content(&format!("panic: {info}"));
            previous(info);
        }));
    });
}
