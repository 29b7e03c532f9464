use crate::activity::Classifier;
use crate::config::AppConfig;
use crate::terminal::stdin_is_terminal;
use crate::tool_config::load_config;
use crate::{crash_log_path, log_file_path, logs_enabled, tracing_log_path};
use crossterm::terminal::size as terminal_size;
use std::{env, fmt::Display, path::Path};

pub struct DoctorReport {
    lines: Vec<String>,
}

impl DoctorReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn base_doctor_report(config: &AppConfig) -> DoctorReport {
    let mut report = DoctorReport::new("Statuslight Doctor");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("os", format!("{}/{}", env::consts::OS, env::consts::ARCH));

    let mut validated = config.clone();
    let validation_result = validated.validate();
    let resolved = validation_result
        .as_ref()
        .map(|_| &validated)
        .unwrap_or(config);

    report.section("Terminal");
    match terminal_size() {
        Ok((cols, rows)) => report.push_kv("size", format!("{cols}x{rows}")),
        Err(err) => report.push_kv("size", format!("error: {err}")),
    }
    report.push_kv(
        "stdin",
        if stdin_is_terminal() {
            "tty (interactive)"
        } else {
            "not a tty (output relay only)"
        },
    );
    if let Ok(term) = env::var("TERM") {
        report.push_kv("term", term);
    }

    report.section("Config");
    match &validation_result {
        Ok(()) => report.push_kv("validation", "ok"),
        Err(err) => report.push_kv("validation", format!("error: {err}")),
    }
    report.push_kv(
        "logs",
        if logs_enabled(resolved) {
            "enabled"
        } else {
            "disabled"
        },
    );
    report.push_kv(
        "log_content",
        if resolved.log_content {
            "enabled"
        } else {
            "disabled"
        },
    );
    report.push_kv("log_file", log_file_path().display());
    report.push_kv("crash_log", crash_log_path().display());
    report.push_kv("trace_log", tracing_log_path().display());

    let config_dir = resolved.resolved_config_dir();
    report.push_kv("config_dir", describe_dir(&config_dir));
    match resolved.tool_name() {
        Some(tool) => push_tool_config(&mut report, &config_dir, &tool, resolved),
        None => report.push_kv("tool", "none (pass a command to check its pattern file)"),
    }

    report.section("Indicator");
    if resolved.no_indicator {
        report.push_kv("indicator", "disabled (--no-indicator)");
        return report;
    }
    match resolved.indicator_settings() {
        Ok(settings) => {
            let found = program_available(&settings.program);
            report.push_kv(
                "program",
                format!(
                    "{} ({})",
                    settings.program,
                    if found { "found" } else { "not found" }
                ),
            );
            if !settings.leading_args.is_empty() {
                report.push_kv("leading_args", settings.leading_args.join(" "));
            }
            report.push_kv(
                "selector",
                settings
                    .selector
                    .map(|selector| selector.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            );
            report.push_kv("timeout_ms", settings.timeout_ms);
        }
        Err(err) => report.push_kv("program", format!("error: {err:#}")),
    }

    report
}

fn push_tool_config(report: &mut DoctorReport, config_dir: &Path, tool: &str, config: &AppConfig) {
    report.push_kv("tool", tool);
    let tool_config = match load_config(config_dir, tool) {
        Ok(tool_config) => tool_config,
        Err(err) => {
            report.push_kv("tool_config", format!("error: {err:#}"));
            return;
        }
    };
    report.push_kv("tool_config", &tool_config.source);
    match Classifier::from_config(&tool_config) {
        Ok(classifier) => {
            report.push_kv("waiting_patterns", classifier.waiting_count());
            report.push_kv("thinking_patterns", classifier.thinking_count());
        }
        Err(err) => report.push_kv("patterns", format!("error: {err:#}")),
    }
    let threshold = config
        .idle_threshold_ms
        .unwrap_or(tool_config.idle_threshold_ms);
    report.push_kv("idle_threshold_ms", threshold);
    report.push_kv("strip_ansi", tool_config.strip_ansi);
}

fn describe_dir(path: &Path) -> String {
    let state = if path.is_dir() { "exists" } else { "missing" };
    format!("{} ({state})", path.display())
}

/// True if `program` is a path to an existing file or resolves on `PATH`.
fn program_available(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
