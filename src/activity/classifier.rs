use anyhow::{Context, Result};
use regex::Regex;
use std::borrow::Cow;

use super::strip::strip_escape_sequences;
use super::ActivityState;
use crate::tool_config::ToolConfig;

/// Compiled waiting/thinking patterns for one tool.
///
/// Waiting patterns are checked before thinking patterns, so output that matches both
/// reads as waiting.
#[derive(Debug, Clone)]
pub struct Classifier {
    waiting: Vec<Regex>,
    thinking: Vec<Regex>,
    strip_ansi: bool,
}

impl Classifier {
    pub fn from_config(config: &ToolConfig) -> Result<Self> {
        Ok(Self {
            waiting: compile_patterns("waiting", &config.patterns.waiting)?,
            thinking: compile_patterns("thinking", &config.patterns.thinking)?,
            strip_ansi: config.strip_ansi,
        })
    }

    /// Classify the retained window. `None` means the content carries no signal; idle is
    /// only ever derived from silence.
    pub fn classify(&self, window: &[u8]) -> Option<ActivityState> {
        let text = self.decode(window);
        if self.waiting.iter().any(|regex| regex.is_match(&text)) {
            return Some(ActivityState::Waiting);
        }
        if self.thinking.iter().any(|regex| regex.is_match(&text)) {
            return Some(ActivityState::Thinking);
        }
        None
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn thinking_count(&self) -> usize {
        self.thinking.len()
    }

    fn decode<'a>(&self, window: &'a [u8]) -> Cow<'a, str> {
        if self.strip_ansi {
            Cow::Owned(strip_escape_sequences(window))
        } else {
            String::from_utf8_lossy(window)
        }
    }
}

fn compile_patterns(group: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|raw| {
            Regex::new(raw).with_context(|| format!("invalid {group} pattern: {raw}"))
        })
        .collect()
}
