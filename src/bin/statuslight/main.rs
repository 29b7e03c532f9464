//! Statuslight entrypoint: run a CLI under a PTY and mirror its activity on an LED.
//!
//! The child's exit code becomes ours; startup failures exit with 1.

use anyhow::{Context, Result};
use clap::Parser;
use statuslight::activity::Classifier;
use statuslight::config::AppConfig;
use statuslight::indicator::{IndicatorCommand, IndicatorSink, NoopIndicator};
use statuslight::supervisor::{self, SupervisorOptions};
use statuslight::tool_config::load_config;
use statuslight::{doctor::base_doctor_report, init_logging, init_tracing, log_debug};
use std::io;
use std::process;
use std::time::Duration;

const USAGE: &str = "Usage: statuslight [OPTIONS] <COMMAND> [ARGS]...";

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            log_debug(&format!("fatal: {err:#}"));
            eprintln!("statuslight: {err:#}");
            1
        }
    };
    process::exit(code);
}

fn run() -> Result<i32> {
    let mut config = AppConfig::parse();
    if config.doctor {
        println!("{}", base_doctor_report(&config).render());
        return Ok(0);
    }
    config.validate()?;
    let Some(tool) = config.tool_name() else {
        eprintln!("{USAGE}");
        return Ok(1);
    };

    init_logging(&config);
    init_tracing(&config);

    let config_dir = config.resolved_config_dir();
    let tool_config = load_config(&config_dir, &tool)?;
    let classifier = Classifier::from_config(&tool_config)?;
    let idle_threshold_ms = config
        .idle_threshold_ms
        .unwrap_or(tool_config.idle_threshold_ms);
    log_debug(&format!(
        "tool {tool}: {} ({} waiting, {} thinking, idle after {idle_threshold_ms}ms)",
        tool_config.source,
        classifier.waiting_count(),
        classifier.thinking_count()
    ));

    let sink: Box<dyn IndicatorSink> = if config.no_indicator {
        Box::new(NoopIndicator)
    } else {
        Box::new(IndicatorCommand::new(config.indicator_settings()?))
    };

    let options = SupervisorOptions::for_current_terminal();
    let mut stdout = io::stdout().lock();
    let report = supervisor::run(
        &config.command,
        &classifier,
        Duration::from_millis(idle_threshold_ms),
        sink,
        &mut stdout,
        &options,
    )
    .with_context(|| format!("supervising {tool}"))?;
    Ok(report.exit_code())
}
