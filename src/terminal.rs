use anyhow::{anyhow, Result};
use crossterm::terminal::size as terminal_size;
use crossterm::tty::IsTty;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::log_debug;

pub const FALLBACK_ROWS: u16 = 24;
pub const FALLBACK_COLS: u16 = 80;

/// Flag set by SIGWINCH handler to trigger a PTY resize.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic, so it is async-signal-safe.
extern "C" fn handle_sigwinch(_: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::SeqCst);
}

pub fn install_sigwinch_handler() -> Result<()> {
    unsafe {
        // SAFETY: handle_sigwinch only flips an atomic flag.
        let handler = handle_sigwinch as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGWINCH, handler) == libc::SIG_ERR {
            log_debug("failed to install SIGWINCH handler");
            return Err(anyhow!("failed to install SIGWINCH handler"));
        }
    }
    Ok(())
}

pub fn take_sigwinch() -> bool {
    SIGWINCH_RECEIVED.swap(false, Ordering::SeqCst)
}

/// True when our stdin is attached to a terminal.
pub fn stdin_is_terminal() -> bool {
    io::stdin().is_tty()
}

/// Current terminal size as `(rows, cols)`, or 80x24 when there is no terminal.
pub fn terminal_rows_cols() -> (u16, u16) {
    match terminal_size() {
        Ok((cols, rows)) if rows > 0 && cols > 0 => (rows, cols),
        _ => (FALLBACK_ROWS, FALLBACK_COLS),
    }
}
