/**
 * ============================================================================
 * CONFIG MODULE
 * ============================================================================
 *
 * PURPOSE: Configuration persistence for RealityFlux
 *
 * FUNCTIONALITY:
 * - Load/save configuration as JSON in the user config directory
 * - Defaults for every missing field
 * - Validation before the configuration is used
 * - API key from the environment (never written to disk)
 *
 * ============================================================================
 */

use crate::gemini::GeminiConfig;
use crate::media::MediaConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FluxConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

impl FluxConfig {
    /**
     * Check values the rest of the crate relies on
     * Returns the first problem found
     */
    pub fn validate(&self) -> Result<(), String> {
        if self.gemini.api_base.trim().is_empty() {
            return Err("Gemini API base URL is required".to_string());
        }
        if self.gemini.image_model.trim().is_empty() || self.gemini.transcription_model.trim().is_empty() {
            return Err("Gemini model ids must not be empty".to_string());
        }
        if self.gemini.request_timeout_seconds == 0 {
            return Err("Request timeout must be at least 1 second".to_string());
        }

        let media = &self.media;
        if media.frame_width == 0 || media.frame_height == 0 {
            return Err("Frame size must be non-zero".to_string());
        }
        if media.ideal_width == 0 || media.ideal_height == 0 {
            return Err("Camera resolution must be non-zero".to_string());
        }
        if !(1..=100).contains(&media.jpeg_quality) {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if media.video_max_duration_ms == 0 || media.audio_max_duration_ms == 0 {
            return Err("Recording ceilings must be non-zero".to_string());
        }
        if media.recording_prefix.trim().is_empty() || media.artifact_prefix.trim().is_empty() {
            return Err("File name prefixes must not be empty".to_string());
        }
        Ok(())
    }
}

// Default config file location
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("realityflux").join("config.json"))
}

// Load configuration from the default location
pub fn load_config() -> Result<FluxConfig, String> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            log::warn!("No config directory on this platform, using defaults");
            Ok(FluxConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<FluxConfig, String> {
    if !path.exists() {
        log::info!("No config found at {:?}, using defaults", path);
        return Ok(FluxConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: FluxConfig =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    config.validate()?;

    log::info!("Loaded config from {:?}", path);
    Ok(config)
}

// Save configuration to the default location
pub fn save_config(config: &FluxConfig) -> Result<(), String> {
    let path = config_path().ok_or_else(|| "No config directory available".to_string())?;
    save_config_to(&path, config)
}

pub fn save_config_to(path: &Path, config: &FluxConfig) -> Result<(), String> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
    }

    let contents =
        serde_json::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(path, contents).map_err(|e| format!("Failed to write config: {}", e))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

/// API key from the environment; empty when unset
pub fn get_api_key() -> String {
    std::env::var(API_KEY_ENV).unwrap_or_default()
}
