//! Config file loading

use std::path::Path;

use anyhow::{Context, Result};
use nuvo_link::SessionConfig;

/// Load session settings from a JSON file, or use defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SessionConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    tracing::debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}
