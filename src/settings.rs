//! Application settings
//!
//! Stored as JSON. Environment variables take precedence over the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const PDFIUM_PATH_ENV: &str = "PAGELIGHT_PDFIUM_PATH";
pub const RENDER_SCALE_ENV: &str = "PAGELIGHT_RENDER_SCALE";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Render scale, 1.0 renders one pixel per point (72 DPI)
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Offer the search field at all
    #[serde(default = "default_true")]
    pub search_enabled: bool,
    /// RGBA
    #[serde(default = "default_highlight_color")]
    pub highlight_color: [u8; 4],
    #[serde(default = "default_corner_radius")]
    pub highlight_corner_radius: f32,
    #[serde(default)]
    pub pdfium_library_path: Option<PathBuf>,
}

fn default_render_scale() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_highlight_color() -> [u8; 4] {
    [255, 255, 0, 128] // yellow, half transparent
}

fn default_corner_radius() -> f32 {
    5.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_scale: default_render_scale(),
            case_sensitive: false,
            search_enabled: true,
            highlight_color: default_highlight_color(),
            highlight_corner_radius: default_corner_radius(),
            pdfium_library_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        let content = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        fs::write(path, content).map_err(write_err)
    }

    /// Apply environment overrides on top of the loaded values.
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(PDFIUM_PATH_ENV).ok(),
            std::env::var(RENDER_SCALE_ENV).ok(),
        )
    }

    fn with_overrides(mut self, pdfium_path: Option<String>, render_scale: Option<String>) -> Self {
        if let Some(path) = pdfium_path.filter(|p| !p.is_empty()) {
            self.pdfium_library_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = render_scale {
            match raw.parse::<f32>() {
                Ok(scale) if scale > 0.0 && scale.is_finite() => self.render_scale = scale,
                _ => warn!(value = %raw, "ignoring invalid {}", RENDER_SCALE_ENV),
            }
        }

        self
    }
}
