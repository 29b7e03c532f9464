//! The supervision loop: run one command on a PTY, relay both directions, and feed what
//! the child prints into the classifier and debounce.
//!
//! Single-threaded. Each tick is one bounded `poll(2)` over the PTY controller (and the
//! input fd when one is relayed), followed by the idle check, resize handling and a
//! non-blocking reap attempt. Input the child is not reading yet waits in a bounded
//! buffer; the loop never blocks on a write to the PTY.

use anyhow::{Context, Result};
use std::io::Write;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crate::activity::{
    request_transition, ActivityState, Classifier, DebounceClock, OutputWindow,
    MIN_STATE_DWELL, OUTPUT_WINDOW_BYTES,
};
use crate::indicator::{IndicatorGuard, IndicatorSink};
use crate::pty_session::{poll_fds, poll_readable, read_fd, Interest, PtySession, ReadOutcome};
use crate::terminal::{install_sigwinch_handler, take_sigwinch, terminal_rows_cols};
use crate::terminal_restore::TerminalModeGuard;
use crate::{log_debug, log_debug_content};

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const READ_CHUNK_BYTES: usize = 1024;

/// Upper bound on how long draining may keep relaying after the child is done.
const DRAIN_BUDGET: Duration = Duration::from_millis(500);
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Input read ahead of the child. At the cap the input fd is left unread until the
/// child catches up.
pub const MAX_PENDING_INPUT: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub tick: Duration,
    pub min_dwell: Duration,
    /// Put the terminal into raw mode and follow SIGWINCH.
    pub interactive: bool,
    /// Where user input comes from; `None` leaves the child's input alone.
    pub input_fd: Option<RawFd>,
    pub read_chunk: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            min_dwell: MIN_STATE_DWELL,
            interactive: false,
            input_fd: None,
            read_chunk: READ_CHUNK_BYTES,
        }
    }
}

impl SupervisorOptions {
    /// Defaults, interactive and relaying stdin when our stdin is a terminal.
    pub fn for_current_terminal() -> Self {
        let interactive = crate::terminal::stdin_is_terminal();
        Self {
            interactive,
            input_fd: interactive.then_some(libc::STDIN_FILENO),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    Draining,
    Terminated,
}

/// Why the loop left `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ChildExited,
    /// The PTY reported end-of-stream or an I/O error on read.
    OutputClosed,
    /// Forwarding user input to the child failed.
    InputFailed,
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            ExitReason::ChildExited => "child exited",
            ExitReason::OutputClosed => "output closed",
            ExitReason::InputFailed => "input failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub status: ExitStatus,
    pub raw_mode_used: bool,
    /// Child bytes written to the real terminal.
    pub output_bytes: u64,
    /// User bytes forwarded to the child.
    pub input_bytes: u64,
    pub reason: ExitReason,
}

impl SessionReport {
    /// Process exit code to mirror: the child's code, or 128 + signal number.
    pub fn exit_code(&self) -> i32 {
        exit_code_for(self.status)
    }
}

pub fn exit_code_for(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    match status.signal() {
        Some(signal) => 128 + signal,
        None => 1,
    }
}

/// Mutable per-run state that is not a guard.
struct LoopState {
    window: OutputWindow,
    clock: DebounceClock,
    last_output_at: Instant,
    input_open: bool,
    /// Read from the input fd, not yet accepted by the PTY.
    pending_input: Vec<u8>,
    output_bytes: u64,
    input_bytes: u64,
}

/// Run `command` under a PTY until it finishes.
///
/// `sink` is cleared exactly once on every return path, including spawn failure. The
/// terminal is only switched to raw mode when `options.interactive` is set, and input is
/// only read from `options.input_fd`.
pub fn run<S, W>(
    command: &[String],
    classifier: &Classifier,
    idle_threshold: Duration,
    sink: S,
    output: &mut W,
    options: &SupervisorOptions,
) -> Result<SessionReport>
where
    S: IndicatorSink,
    W: Write,
{
    // Dropped in reverse order: session, then indicator, then terminal mode.
    let mut terminal = TerminalModeGuard::inactive();
    let mut indicator = IndicatorGuard::new(sink);

    let (rows, cols) = terminal_rows_cols();
    let mut session = PtySession::spawn(command, rows, cols)?;

    if options.interactive {
        terminal
            .enable_raw_mode()
            .context("failed to enable raw mode")?;
        if let Err(err) = install_sigwinch_handler() {
            log_debug(&format!("resize tracking disabled: {err:#}"));
        }
    }

    let mut state = LoopState {
        window: OutputWindow::with_capacity(OUTPUT_WINDOW_BYTES),
        clock: DebounceClock::new(options.min_dwell),
        last_output_at: Instant::now(),
        input_open: options.input_fd.is_some(),
        pending_input: Vec::new(),
        output_bytes: 0,
        input_bytes: 0,
    };
    let mut buffer = vec![0u8; options.read_chunk.max(1)];
    let mut phase = LoopPhase::Running;
    let mut reason = ExitReason::ChildExited;

    while phase == LoopPhase::Running {
        let mut watched = vec![(session.controller_fd(), Interest::Read)];
        let input_slot = match options.input_fd {
            Some(fd) if state.input_open && state.pending_input.len() < MAX_PENDING_INPUT => {
                watched.push((fd, Interest::Read));
                Some(watched.len() - 1)
            }
            _ => None,
        };
        if !state.pending_input.is_empty() {
            watched.push((session.controller_fd(), Interest::Write));
        }
        let ready = poll_fds(&watched, options.tick)?;
        let now = Instant::now();
        let mut saw_output = false;

        if ready[0] {
            match session.read_chunk(&mut buffer) {
                ReadOutcome::Data(n) => {
                    let chunk = &buffer[..n];
                    relay(output, chunk)?;
                    state.output_bytes += n as u64;
                    state.window.push(chunk);
                    state.last_output_at = now;
                    saw_output = true;
                    if let Some(candidate) = classifier.classify(state.window.as_bytes()) {
                        if request_transition(&mut state.clock, indicator.sink(), candidate, now)
                        {
                            log_debug_content(&format!(
                                "{candidate} matched on {:?}",
                                window_tail(state.window.as_bytes())
                            ));
                        }
                    }
                }
                ReadOutcome::Pending => {}
                ReadOutcome::Closed => {
                    reason = ExitReason::OutputClosed;
                    phase = LoopPhase::Draining;
                }
            }
        }

        if phase == LoopPhase::Running
            && !saw_output
            && now.saturating_duration_since(state.last_output_at) > idle_threshold
        {
            request_transition(&mut state.clock, indicator.sink(), ActivityState::Idle, now);
        }

        if let (Some(fd), Some(slot)) = (options.input_fd, input_slot) {
            if phase == LoopPhase::Running && ready[slot] {
                match read_fd(fd, &mut buffer) {
                    ReadOutcome::Data(n) => state.pending_input.extend_from_slice(&buffer[..n]),
                    ReadOutcome::Pending => {}
                    ReadOutcome::Closed => {
                        log_debug("input closed; no longer forwarding input");
                        state.input_open = false;
                    }
                }
            }
        }

        if phase == LoopPhase::Running && !state.pending_input.is_empty() {
            if let Err(err) = forward_input(&session, &mut state) {
                log_debug(&format!("forwarding input failed: {err:#}"));
                reason = ExitReason::InputFailed;
                phase = LoopPhase::Draining;
            }
        }

        if options.interactive && take_sigwinch() {
            let (rows, cols) = terminal_rows_cols();
            if let Err(err) = session.set_winsize(rows, cols) {
                log_debug(&format!("resize to {rows}x{cols} failed: {err:#}"));
            }
        }

        if phase == LoopPhase::Running && session.try_wait()?.is_some() {
            reason = ExitReason::ChildExited;
            phase = LoopPhase::Draining;
        }
    }

    if !state.pending_input.is_empty() {
        log_debug(&format!(
            "dropping {} bytes of input the child never read",
            state.pending_input.len()
        ));
        state.pending_input.clear();
    }

    let drained = drain(&session, &mut buffer, output)?;
    state.output_bytes += drained;
    request_transition(
        &mut state.clock,
        indicator.sink(),
        ActivityState::Idle,
        Instant::now(),
    );

    let status = session.wait()?;
    phase = LoopPhase::Terminated;
    log_debug(&format!(
        "session {:?}: pid {} {} ({status}); {} bytes out, {} bytes in",
        phase,
        session.child_pid(),
        reason.label(),
        state.output_bytes,
        state.input_bytes
    ));
    tracing::info!(
        target: "statuslight::supervisor",
        pid = session.child_pid(),
        reason = reason.label(),
        exit_code = exit_code_for(status),
        output_bytes = state.output_bytes,
        input_bytes = state.input_bytes,
        "session finished"
    );

    Ok(SessionReport {
        status,
        raw_mode_used: terminal.raw_mode_used(),
        output_bytes: state.output_bytes,
        input_bytes: state.input_bytes,
        reason,
    })
}

fn relay<W: Write>(output: &mut W, chunk: &[u8]) -> Result<()> {
    output
        .write_all(chunk)
        .context("failed to write child output")?;
    output.flush().context("failed to write child output")
}

/// Hand the PTY as much pending input as it accepts right now.
fn forward_input(session: &PtySession, state: &mut LoopState) -> Result<()> {
    let accepted = session.try_send(&state.pending_input)?;
    state.pending_input.drain(..accepted);
    state.input_bytes += accepted as u64;
    Ok(())
}

fn window_tail(window: &[u8]) -> String {
    const TAIL_BYTES: usize = 80;
    let start = window.len().saturating_sub(TAIL_BYTES);
    String::from_utf8_lossy(&window[start..]).into_owned()
}

/// Relay whatever the PTY still holds. Nothing here is classified.
fn drain<W: Write>(session: &PtySession, buffer: &mut [u8], output: &mut W) -> Result<u64> {
    let started = Instant::now();
    let mut relayed = 0u64;
    while started.elapsed() < DRAIN_BUDGET {
        let ready = poll_readable(&[session.controller_fd()], DRAIN_POLL)?;
        if !ready[0] {
            break;
        }
        match session.read_chunk(buffer) {
            ReadOutcome::Data(n) => {
                relay(output, &buffer[..n])?;
                relayed += n as u64;
            }
            ReadOutcome::Pending => {}
            ReadOutcome::Closed => break,
        }
    }
    Ok(relayed)
}

#[cfg(test)]
mod tests;
