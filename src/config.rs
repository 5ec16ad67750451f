use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::outcome::ThresholdTable;

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrillConfig {
    /// Extra steps beyond the longest acyclic path that an attempt may take
    /// by looping back through cycles.
    pub revisit_allowance: usize,
    /// Table used for scenarios that do not bring their own.
    pub default_thresholds: ThresholdTable,
    /// Where attempts are appended as JSON lines. `None` keeps them in memory.
    pub attempt_log: Option<PathBuf>,
    /// Identity used by the console when none is given on the command line.
    pub default_user: String,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            revisit_allowance: 8,
            default_thresholds: ThresholdTable::default(),
            attempt_log: None,
            default_user: "trainee".into(),
        }
    }
}

impl DrillConfig {
    /// Read a JSON config file. Missing fields fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: DrillConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .default_thresholds
            .check()
            .context("default thresholds are malformed")?;
        Ok(config)
    }
}
