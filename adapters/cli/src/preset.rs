use std::{fs, path::Path};

use anyhow::{Context, Result};
use optics_lab_core::SimulationParams;

/// Reads a TOML preset from disk.
pub(crate) fn load_preset(path: &Path) -> Result<SimulationParams> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read preset {}", path.display()))?;
    parse_preset(&contents).with_context(|| format!("failed to parse preset {}", path.display()))
}

/// Parses preset contents. Keys that are absent keep their default values and
/// unknown keys are rejected.
pub(crate) fn parse_preset(contents: &str) -> Result<SimulationParams, toml::de::Error> {
    toml::from_str(contents)
}
