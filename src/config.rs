//! Drawing pad configuration.
//!
//! Loaded from TOML; every section falls back to its defaults when omitted.

use crate::error::{ConfigError, ConfigResult};
use crate::history::DEFAULT_MAX_ENTRIES;
use crate::{Color, ToolState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_BRUSH_WIDTH: u32 = 100;

/// Initial surface size
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Oldest snapshots are evicted past this many entries
    pub max_entries: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_entries: DEFAULT_MAX_ENTRIES }
    }
}

/// Tool defaults applied when a session starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub brush_width: u32,
    pub color: String,
    pub opacity: f64,
    pub mirror: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            brush_width: 5,
            color: "#000000".to_string(),
            opacity: 1.0,
            mirror: false,
        }
    }
}

/// Where saved drawings go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base URL of the save/list/clear service, if any
    pub api_base: Option<String>,
    /// Directory of the local fallback store; the platform data dir when unset
    pub local_dir: Option<PathBuf>,
    /// lz-string compress the local slot
    pub compress: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            local_dir: None,
            compress: false,
        }
    }
}

impl StorageSettings {
    pub fn resolve_local_dir(&self) -> ConfigResult<PathBuf> {
        match &self.local_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("drawing-pad"))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasSettings,
    pub history: HistorySettings,
    pub tools: ToolSettings,
    pub storage: StorageSettings,
}

impl Config {
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(invalid("canvas", "width and height must be positive"));
        }
        if self.history.max_entries == 0 {
            return Err(invalid("history.max_entries", "must be at least 1"));
        }
        if !(1..=MAX_BRUSH_WIDTH).contains(&self.tools.brush_width) {
            return Err(invalid(
                "tools.brush_width",
                &format!("must be within 1..={}", MAX_BRUSH_WIDTH),
            ));
        }
        if !(0.0..=1.0).contains(&self.tools.opacity) {
            return Err(invalid("tools.opacity", "must be within 0.0..=1.0"));
        }
        if let Err(err) = Color::from_hex(&self.tools.color) {
            return Err(invalid("tools.color", &err.to_string()));
        }
        Ok(())
    }

    /// Tool state a fresh session starts with.
    pub fn tool_state(&self) -> ToolState {
        ToolState {
            brush_width: self.tools.brush_width,
            color: Color::from_hex(&self.tools.color).unwrap_or(Color::BLACK),
            opacity: self.tools.opacity,
            mirror: self.tools.mirror,
            ..ToolState::default()
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
