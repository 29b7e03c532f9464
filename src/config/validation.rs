use super::defaults::{
    default_config_dir, default_indicator_command, MAX_IDLE_THRESHOLD_MS,
    MAX_INDICATOR_TIMEOUT_MS, MIN_INDICATOR_TIMEOUT_MS,
};
use super::{AppConfig, IndicatorSettings};
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Check CLI values before anything is spawned.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_INDICATOR_TIMEOUT_MS..=MAX_INDICATOR_TIMEOUT_MS)
            .contains(&self.indicator_timeout_ms)
        {
            bail!(
                "--indicator-timeout-ms must be between {MIN_INDICATOR_TIMEOUT_MS} and {MAX_INDICATOR_TIMEOUT_MS}, got {}",
                self.indicator_timeout_ms
            );
        }

        if let Some(threshold) = self.idle_threshold_ms {
            if threshold == 0 || threshold > MAX_IDLE_THRESHOLD_MS {
                bail!(
                    "--idle-threshold-ms must be between 1 and {MAX_IDLE_THRESHOLD_MS}, got {threshold}"
                );
            }
        }

        if let Some(raw) = self.indicator.as_deref() {
            if raw.trim().is_empty() {
                bail!("--indicator must not be empty");
            }
            split_indicator_command(raw)?;
        }

        if let Some(program) = self.command.first() {
            if program.is_empty() {
                bail!("command must not be empty");
            }
            if self.command.iter().any(|arg| arg.contains('\0')) {
                bail!("command arguments must not contain NUL bytes");
            }
        }

        if self.no_logs {
            self.logs = false;
            self.log_content = false;
        }
        Ok(())
    }

    /// Config directory from the CLI/env, else `configs/` next to the binary.
    pub fn resolved_config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_config_dir)
    }

    /// Name used to pick `<tool>.yaml`: the basename of the child command.
    pub fn tool_name(&self) -> Option<String> {
        let program = self.command.first()?;
        let name = Path::new(program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());
        Some(name)
    }

    pub fn indicator_settings(&self) -> Result<IndicatorSettings> {
        let raw = self
            .indicator
            .clone()
            .unwrap_or_else(default_indicator_command);
        let mut parts = if self.indicator.is_some() {
            split_indicator_command(&raw)?
        } else {
            // The default is a filesystem path and may contain spaces.
            vec![raw]
        };
        let program = parts.remove(0);
        Ok(IndicatorSettings {
            program,
            leading_args: parts,
            selector: self.indicator_selector,
            timeout_ms: self.indicator_timeout_ms,
        })
    }
}

fn split_indicator_command(raw: &str) -> Result<Vec<String>> {
    let parts = shell_words::split(raw)
        .with_context(|| format!("invalid --indicator command line: {raw}"))?;
    if parts.is_empty() {
        return Err(anyhow!("--indicator must name a program"));
    }
    Ok(parts)
}
