use super::*;
use crate::indicator::{IndicatorEvent, RecordingIndicator};
use crate::tool_config::{PatternLists, ToolConfig};
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;
use std::thread;

fn classifier(waiting: &[&str], thinking: &[&str]) -> Classifier {
    let config = ToolConfig {
        patterns: PatternLists {
            waiting: waiting.iter().map(|p| p.to_string()).collect(),
            thinking: thinking.iter().map(|p| p.to_string()).collect(),
        },
        ..ToolConfig::default()
    };
    Classifier::from_config(&config).expect("patterns compile")
}

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn set_events(recorder: &RecordingIndicator) -> Vec<(ActivityState, Instant)> {
    recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            IndicatorEvent::Set(state, at) => Some((state, at)),
            IndicatorEvent::Clear(_) => None,
        })
        .collect()
}

fn pipe_pair() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(result, 0, "pipe() failed: {}", io::Error::last_os_error());
    (fds[0], fds[1])
}

fn reading_from(fd: RawFd) -> SupervisorOptions {
    SupervisorOptions {
        input_fd: Some(fd),
        ..SupervisorOptions::default()
    }
}

struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn end_to_end_sequence_follows_output() {
    let recorder = RecordingIndicator::new();
    let mut output = Vec::new();
    let report = run(
        &sh("printf 'Processing...'; sleep 0.8; printf 'Continue?'; sleep 0.6"),
        &classifier(&["Continue\\?"], &["Processing"]),
        Duration::from_millis(300),
        recorder.clone(),
        &mut output,
        &SupervisorOptions::default(),
    )
    .expect("run");

    assert!(report.status.success());
    assert_eq!(
        recorder.states(),
        vec![
            ActivityState::Thinking,
            ActivityState::Idle,
            ActivityState::Waiting,
            ActivityState::Idle,
        ]
    );
    let events = set_events(&recorder);
    for pair in events.windows(2) {
        assert_ne!(pair[0].0, pair[1].0, "duplicate consecutive state");
        assert!(
            pair[1].1.duration_since(pair[0].1) > MIN_STATE_DWELL,
            "indicator changed inside the dwell"
        );
    }
    assert_eq!(recorder.clear_count(), 1);
    assert!(matches!(
        recorder.events().last(),
        Some(IndicatorEvent::Clear(_))
    ));
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("Processing...") && text.contains("Continue?"));
}

#[test]
fn prompt_inside_dwell_after_idle_is_dropped() {
    // "Continue?" lands right after the idle transition, so it is rejected by the dwell and
    // nothing re-requests Waiting once the dwell has passed.
    let recorder = RecordingIndicator::new();
    let report = run(
        &sh("printf 'Processing...'; sleep 0.4; printf 'Continue?'; sleep 0.5"),
        &classifier(&["\\?\\s*$"], &["\\.\\.\\.$"]),
        Duration::from_millis(300),
        recorder.clone(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");

    assert!(report.status.success());
    assert_eq!(
        recorder.states(),
        vec![ActivityState::Thinking, ActivityState::Idle]
    );
    assert_eq!(recorder.clear_count(), 1);
}

#[test]
fn input_is_forwarded_until_eof() {
    let (reader, writer) = pipe_pair();
    let mut input = unsafe { File::from_raw_fd(writer) };
    input.write_all(b"abc\n").expect("write input");
    drop(input);

    let mut output = Vec::new();
    let report = run(
        &sh("read line; sleep 0.3; printf 'got:%s' \"$line\""),
        &classifier(&[], &[]),
        Duration::from_millis(1000),
        RecordingIndicator::new(),
        &mut output,
        &reading_from(reader),
    )
    .expect("run");
    unsafe { libc::close(reader) };

    // EOF on the input side stops forwarding but leaves the session running.
    assert!(report.status.success());
    assert!(!report.raw_mode_used);
    assert_eq!(report.input_bytes, 4);
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("got:abc"), "unexpected output: {text:?}");
}

#[test]
fn stalled_child_input_does_not_block_exit() {
    const FLOOD_BYTES: usize = 256 * 1024;
    let (reader, writer) = pipe_pair();
    let feeder = thread::spawn(move || {
        let mut input = unsafe { File::from_raw_fd(writer) };
        // Fails with EPIPE once the read end is closed below.
        let _ = input.write_all(&vec![b'x'; FLOOD_BYTES]);
    });

    let recorder = RecordingIndicator::new();
    let started = Instant::now();
    let report = run(
        &sh("stty raw -echo; sleep 1"),
        &classifier(&[], &[]),
        Duration::from_millis(300),
        recorder.clone(),
        &mut Vec::new(),
        &reading_from(reader),
    )
    .expect("run");
    let elapsed = started.elapsed();
    unsafe { libc::close(reader) };
    feeder.join().expect("feeder thread");

    assert!(elapsed < Duration::from_secs(5), "run took {elapsed:?}");
    assert_eq!(report.exit_code(), 0);
    assert!(report.input_bytes > 0);
    assert!(report.input_bytes < FLOOD_BYTES as u64);
    assert_eq!(recorder.states(), vec![ActivityState::Idle]);
    assert_eq!(recorder.clear_count(), 1);
}

#[test]
fn output_is_relayed_byte_for_byte() {
    let mut output = Vec::new();
    let report = run(
        &sh("seq 1 3000"),
        &classifier(&[], &[]),
        Duration::from_millis(500),
        RecordingIndicator::new(),
        &mut output,
        &SupervisorOptions::default(),
    )
    .expect("run");

    // The PTY line discipline turns each newline into CRLF.
    let expected: String = (1..=3000).map(|n| format!("{n}\r\n")).collect();
    assert_eq!(String::from_utf8_lossy(&output), expected);
    assert_eq!(report.output_bytes, output.len() as u64);
}

#[test]
fn non_interactive_run_never_touches_stdin_or_raw_mode() {
    let mut output = Vec::new();
    let report = run(
        &sh("printf done"),
        &classifier(&[], &[]),
        Duration::from_millis(500),
        RecordingIndicator::new(),
        &mut output,
        &SupervisorOptions::default(),
    )
    .expect("run");
    assert!(!report.raw_mode_used);
    assert_eq!(report.input_bytes, 0);
}

#[test]
fn idle_is_reported_within_a_tick_of_the_threshold() {
    let recorder = RecordingIndicator::new();
    let threshold = Duration::from_millis(300);
    run(
        &sh("printf 'Processing...'; sleep 1"),
        &classifier(&[], &["Processing"]),
        threshold,
        recorder.clone(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");

    let events = set_events(&recorder);
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert_eq!(events[0].0, ActivityState::Thinking);
    assert_eq!(events[1].0, ActivityState::Idle);
    let quiet_for = events[1].1.duration_since(events[0].1);
    assert!(quiet_for > threshold, "idle too early: {quiet_for:?}");
    assert!(
        quiet_for < threshold + DEFAULT_TICK + Duration::from_millis(200),
        "idle too late: {quiet_for:?}"
    );
}

#[test]
fn waiting_wins_when_both_patterns_match() {
    let recorder = RecordingIndicator::new();
    run(
        &sh("printf 'Processing... Continue?'; sleep 0.3"),
        &classifier(&["Continue\\?"], &["Processing"]),
        Duration::from_millis(1000),
        recorder.clone(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");
    assert_eq!(recorder.states().first(), Some(&ActivityState::Waiting));
    assert!(!recorder.states().contains(&ActivityState::Thinking));
}

#[test]
fn silent_child_only_goes_idle() {
    let recorder = RecordingIndicator::new();
    let report = run(
        &sh("sleep 0.5"),
        &classifier(&["Continue\\?"], &["Processing"]),
        Duration::from_millis(100),
        recorder.clone(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");
    assert_eq!(recorder.states(), vec![ActivityState::Idle]);
    assert_eq!(report.output_bytes, 0);
    assert_eq!(report.reason, ExitReason::ChildExited);
}

#[test]
fn exit_code_mirrors_child() {
    let report = run(
        &sh("exit 3"),
        &classifier(&[], &[]),
        Duration::from_millis(500),
        RecordingIndicator::new(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");
    assert_eq!(report.exit_code(), 3);
}

#[test]
fn signal_exit_maps_to_128_plus_signal() {
    let report = run(
        &sh("kill -TERM $$"),
        &classifier(&[], &[]),
        Duration::from_millis(500),
        RecordingIndicator::new(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    )
    .expect("run");
    assert_eq!(report.exit_code(), 128 + libc::SIGTERM);
}

#[test]
fn spawn_failure_still_clears_indicator_once() {
    let recorder = RecordingIndicator::new();
    let result = run(
        &["/nonexistent/statuslight-child".to_string()],
        &classifier(&[], &[]),
        Duration::from_millis(500),
        recorder.clone(),
        &mut Vec::new(),
        &SupervisorOptions::default(),
    );
    assert!(result.is_err());
    assert!(recorder.states().is_empty());
    assert_eq!(recorder.clear_count(), 1);
}

#[test]
fn output_write_failure_is_an_error_after_cleanup() {
    let recorder = RecordingIndicator::new();
    let result = run(
        &sh("printf 'Processing...'"),
        &classifier(&[], &["Processing"]),
        Duration::from_millis(500),
        recorder.clone(),
        &mut FailingWriter,
        &SupervisorOptions::default(),
    );
    let err = result.err().expect("write failure should surface");
    assert!(format!("{err:#}").contains("failed to write child output"));
    assert_eq!(recorder.clear_count(), 1);
}

#[test]
fn exit_code_for_plain_status() {
    assert_eq!(exit_code_for(ExitStatus::from_raw(0)), 0);
    assert_eq!(exit_code_for(ExitStatus::from_raw(2 << 8)), 2);
    assert_eq!(exit_code_for(ExitStatus::from_raw(libc::SIGKILL)), 128 + 9);
}

#[test]
fn default_options_match_loop_constants() {
    let options = SupervisorOptions::default();
    assert_eq!(options.tick, Duration::from_millis(100));
    assert_eq!(options.min_dwell, MIN_STATE_DWELL);
    assert_eq!(options.read_chunk, 1024);
    assert!(!options.interactive);
    assert_eq!(options.input_fd, None);
}
