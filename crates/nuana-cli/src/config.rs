//! Analysis configuration (YAML; JSON is accepted as a YAML subset).

use anyhow::{Context, Result};
use nuana_cuts::ReplayConfig;
use nuana_reco::SelectorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for both passes. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Online selector options.
    pub selector: SelectorConfig,
    /// Replay-only gate thresholds.
    pub replay: ReplayConfig,
    /// Stop after this many input events.
    pub max_events: Option<u64>,
}

/// Read `path`, or the defaults when no path is given.
pub fn read_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AnalysisConfig = serde_yaml_ng::from_slice(&bytes)
        .with_context(|| format!("invalid config {}", path.display()))?;
    config.selector.validate().with_context(|| format!("selector section of {}", path.display()))?;
    config.replay.validate().with_context(|| format!("replay section of {}", path.display()))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}
