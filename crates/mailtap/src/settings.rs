//! Parser settings loaded from disk.

use std::path::{Path, PathBuf};

use anyhow::Context;
use mailtap_smtp::ParserConfig;

/// Returns `<config_dir>/mailtap/config.json`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtap")
        .join("config.json")
}

/// Loads parser limits.
///
/// An explicit `path` must exist. Without one, the default location is tried
/// and a missing file yields the default limits.
pub async fn load(path: Option<&Path>) -> anyhow::Result<ParserConfig> {
    let settings_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_path();
            if !path.exists() {
                tracing::debug!(?path, "No settings file, using default limits");
                return Ok(ParserConfig::default());
            }
            path
        }
    };

    let contents = tokio::fs::read_to_string(&settings_path)
        .await
        .with_context(|| format!("reading {}", settings_path.display()))?;

    let config = parse(&contents).with_context(|| format!("parsing {}", settings_path.display()))?;
    tracing::info!(path = ?settings_path, ?config, "Settings loaded");
    Ok(config)
}

/// Parses settings JSON; omitted fields keep their defaults.
pub fn parse(contents: &str) -> serde_json::Result<ParserConfig> {
    serde_json::from_str(contents)
}
