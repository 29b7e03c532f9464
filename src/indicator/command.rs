use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::IndicatorSink;
use crate::activity::ActivityState;
use crate::config::IndicatorSettings;
use crate::log_debug;

/// Arguments that switch the LED off.
pub const CLEAR_ARGS: &[&str] = &["o"];

const MODE_FLAG: &str = "a";
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

fn state_rgb(state: ActivityState) -> (u8, u8, u8) {
    match state {
        ActivityState::Idle => (0, 0, 255),
        ActivityState::Thinking => (255, 255, 0),
        ActivityState::Waiting => (255, 0, 0),
    }
}

/// Positional arguments for `state`: mode flag, optional selector, then R G B.
pub fn state_args(state: ActivityState, selector: Option<u8>) -> Vec<String> {
    let (red, green, blue) = state_rgb(state);
    let mut args = vec![MODE_FLAG.to_string()];
    if let Some(selector) = selector {
        args.push(selector.to_string());
    }
    args.extend([red, green, blue].iter().map(u8::to_string));
    args
}

/// Runs the external LED program once per state change.
#[derive(Debug, Clone)]
pub struct IndicatorCommand {
    settings: IndicatorSettings,
}

impl IndicatorCommand {
    pub fn new(settings: IndicatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }

    fn invoke(&self, label: &str, args: &[String]) {
        let timeout = Duration::from_millis(self.settings.timeout_ms);
        match self.run(args, timeout) {
            Ok(Some(status)) if status.success() => {}
            Ok(Some(status)) => {
                log_debug(&format!("indicator {label} exited with {status}"));
            }
            Ok(None) => {
                log_debug(&format!(
                    "indicator {label} timed out after {}ms; killed",
                    timeout.as_millis()
                ));
            }
            Err(err) => {
                log_debug(&format!(
                    "indicator {label} failed to run {}: {err}",
                    self.settings.program
                ));
            }
        }
    }

    /// `Ok(None)` means the command outlived `timeout` and was killed.
    fn run(&self, args: &[String], timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let mut child = Command::new(&self.settings.program)
            .args(&self.settings.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        wait_with_timeout(&mut child, timeout)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

impl IndicatorSink for IndicatorCommand {
    fn set_state(&mut self, state: ActivityState) {
        let args = state_args(state, self.settings.selector);
        self.invoke(state.label(), &args);
    }

    fn clear(&mut self) {
        let args: Vec<String> = CLEAR_ARGS.iter().map(|arg| arg.to_string()).collect();
        self.invoke("clear", &args);
    }
}
