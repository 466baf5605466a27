//! Renderer configuration
//!
//! Settings the renderer reads at startup: surface size, present mode,
//! offscreen target sizes and post-processing knobs. Loaded from TOML with
//! full defaults so a missing file is never an error for callers that want
//! the stock configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error while reading the settings file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error in the settings file
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Present-mode preference for the swap-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// V-synced FIFO; always available
    Fifo,
    /// Low-latency triple buffering when the surface supports it
    Mailbox,
    /// Unsynchronized; allows tearing
    Immediate,
}

/// Renderer settings consumed at startup and on swap-chain recreation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Initial surface width in pixels
    pub width: u32,
    /// Initial surface height in pixels
    pub height: u32,
    /// Preferred present mode (falls back to FIFO)
    pub present_mode: PresentModePreference,
    /// High-resolution shadow cascade extent (square)
    pub shadow_map_hi_size: u32,
    /// Low-resolution shadow cascade extent (square)
    pub shadow_map_lo_size: u32,
    /// Number of bloom pyramid levels
    pub bloom_levels: u32,
    /// Use image-based lighting in the deferred lighting subpass
    pub use_ibl: bool,
    /// Exposure applied in the post-process tonemap
    pub exposure: f32,
    /// Clear colour of the 3D pass (linear RGBA)
    pub clear_color: [f32; 4],
    /// Directory holding the SPIR-V artifacts for every pipeline variant
    pub shader_dir: PathBuf,
    /// Enable Vulkan validation layers (debug builds honour this)
    pub enable_validation: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            present_mode: PresentModePreference::Fifo,
            shadow_map_hi_size: 2048,
            shadow_map_lo_size: 1024,
            bloom_levels: 6,
            use_ibl: false,
            exposure: 1.0,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            shader_dir: PathBuf::from("shaders/spv"),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl RendererSettings {
    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings from a TOML file, logging and falling back to defaults
    /// when the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(path.as_ref()) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Could not load renderer settings from {}: {e}; using defaults",
                    path.as_ref().display()
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_expectations() {
        let s = RendererSettings::default();
        assert_eq!(s.shadow_map_hi_size, 2048);
        assert_eq!(s.shadow_map_lo_size, 1024);
        assert_eq!(s.bloom_levels, 6);
        assert_eq!(s.clear_color, [0.01, 0.01, 0.01, 1.0]);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let s: RendererSettings = toml::from_str("width = 1280\nheight = 720\n").unwrap();
        assert_eq!(s.width, 1280);
        assert_eq!(s.height, 720);
        assert_eq!(s.bloom_levels, RendererSettings::default().bloom_levels);
    }

    #[test]
    fn present_mode_round_trips_through_toml() {
        let s = RendererSettings {
            present_mode: PresentModePreference::Mailbox,
            ..Default::default()
        };
        let text = toml::to_string(&s).unwrap();
        let back: RendererSettings = toml::from_str(&text).unwrap();
        assert_eq!(back.present_mode, PresentModePreference::Mailbox);
    }
}
