use anyhow::{Context as _, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Session tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of upcoming trace steps scanned for missing ancestor chains.
    pub prefetch_window: usize,
    /// Auto-advance period while a trace is playing.
    pub playback_interval_ms: u64,
    /// Matched against step messages to place failure markers.
    pub failure_pattern: String,
    /// Group label the store uses for indirect summaries.
    pub aggregate_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefetch_window: 100,
            playback_interval_ms: 800,
            failure_pattern: r"(?i)\b(ERROR|FAIL|FAILED|FAILURE|NOK|EXCEPTION)\b".to_string(),
            aggregate_label: "aggregated".to_string(),
        }
    }
}

impl SessionConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SessionConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, or the file at `path` when one is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.prefetch_window > 0, "prefetch_window must be at least 1");
        anyhow::ensure!(
            self.playback_interval_ms > 0,
            "playback_interval_ms must be at least 1"
        );
        self.failure_regex()?;
        Ok(())
    }

    pub fn failure_regex(&self) -> Result<Regex> {
        Regex::new(&self.failure_pattern)
            .with_context(|| format!("Invalid failure_pattern: {}", self.failure_pattern))
    }

    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms)
    }
}
