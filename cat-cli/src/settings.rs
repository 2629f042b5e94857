//! Saved settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cat_protocol::CwHandling;
use serde::{Deserialize, Serialize};

use crate::cli::RadioOpts;

/// Settings persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Last serial port used
    #[serde(default)]
    pub port: Option<String>,
    /// Last radio model used
    #[serde(default)]
    pub model: Option<String>,
    /// Baud override (model default when absent)
    #[serde(default)]
    pub baud: Option<u32>,
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// CW handling when setting modes
    #[serde(default)]
    pub cw_handling: CwHandling,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            model: None,
            baud: None,
            poll_interval_ms: default_poll_interval_ms(),
            cw_handling: CwHandling::PassThrough,
        }
    }
}

impl Settings {
    /// Config directory for potacat
    /// Honors an absolute $XDG_CONFIG_HOME, else the platform config dir
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("potacat"));
            }
        }
        dirs::config_dir().map(|p| p.join("potacat"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings, falling back to defaults when missing or unreadable
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings in {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path().context("could not determine settings path")?;
        self.save_to(&path)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Overlay command-line flags; flags win
    pub fn apply(&mut self, opts: &RadioOpts) {
        if let Some(port) = &opts.port {
            self.port = Some(port.clone());
        }
        if let Some(model) = &opts.model {
            self.model = Some(model.clone());
        }
        if opts.baud.is_some() {
            self.baud = opts.baud;
        }
    }
}
