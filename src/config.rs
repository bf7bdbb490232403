// src/config.rs

//! Defines the configuration structures for the matrix-os runtime.
//!
//! This module provides a set of structs that can be deserialized from a
//! JSON configuration file to customize the display geometry and loop
//! pacing. Default values are provided for every option; a missing file or
//! a missing section falls back to defaults.
//!
//! The configuration is constructed once in `main` and passed down through
//! constructors. There is deliberately no process-global config static.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Represents the complete configuration for the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Display geometry settings.
    pub display: DisplayConfig,
    /// Loop pacing settings.
    pub performance: PerformanceConfig,
    /// Persistence settings.
    pub storage: StorageConfig,
}

/// Defines the requested matrix geometry.
///
/// Concrete drivers may clamp these (a terminal smaller than the requested
/// matrix reports its own, smaller dimensions); the runtime always sizes
/// its pixel buffer from the *selected driver's* reported dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Requested matrix width in pixels.
    pub width: u32,
    /// Requested matrix height in pixels.
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 256,
            height: 192,
        }
    }
}

/// Loop pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Target frame rate for the cooperative scheduler.
    pub target_fps: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig { target_fps: 60 }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON key-value store backing app persistence.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: PathBuf::from("matrix-os-storage.json"),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Loads configuration from `path` if given, otherwise returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                info!("Configuration loaded (using defaults).");
                Ok(Config::default())
            }
        }
    }
}
