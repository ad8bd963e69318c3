//! Engine settings loaded from an optional JSON file.

use crate::layout::LayoutConfig;
use crate::render::ShellType;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings read from an optional JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub shell: ShellType,
    /// Directory fragments are written to; `$HOME` is left for the shell.
    pub config_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            shell: ShellType::default(),
            config_dir: "$HOME/.config/rcgraph".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.layout.depth_spacing <= 0.0 || self.layout.sibling_spacing <= 0.0 {
            bail!(
                "layout spacing must be positive (depth_spacing={}, sibling_spacing={})",
                self.layout.depth_spacing,
                self.layout.sibling_spacing
            );
        }
        if self.config_dir.trim().is_empty() {
            bail!("config_dir cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "shell": "fish", "layout": { "depth_spacing": 250 } }"#)
                .unwrap();
        assert_eq!(config.shell, ShellType::Fish);
        assert_eq!(config.layout.depth_spacing, 250.0);
        assert_eq!(config.layout.sibling_spacing, 200.0);
        assert_eq!(config.config_dir, "$HOME/.config/rcgraph");
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(EngineConfig::load(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn bad_values_are_rejected() {
        let path = std::env::temp_dir().join(format!("rcgraph-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "layout": { "sibling_spacing": 0 } }"#).unwrap();
        let err = EngineConfig::load(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("spacing must be positive"));
    }
}
