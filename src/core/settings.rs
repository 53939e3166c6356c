use crate::shared::paths::{ensure_dir, get_storage_dir};
use crate::timelapse::types::{
    Codec, DEFAULT_BITRATE_KBPS, DEFAULT_RECORD_FPS, DEFAULT_TARGET_FPS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub recordings_dir: PathBuf,
    pub encoder_program: String,
    pub container: String,
    pub codec: Codec,
    pub cpu_threads: Option<u16>,
    pub grace_period_secs: u64,
    pub tick_interval_ms: u64,
    pub record_fps: f64,
    pub target_fps: f64,
    pub bitrate_kbps: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            encoder_program: "ffmpeg".to_string(),
            container: "mkv".to_string(),
            codec: Codec::Gpu,
            cpu_threads: None,
            grace_period_secs: 30,
            tick_interval_ms: 16,
            record_fps: DEFAULT_RECORD_FPS,
            target_fps: DEFAULT_TARGET_FPS,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&get_settings_path())
}

/// Missing or unparsable files yield the defaults. A missing file is
/// created with the defaults so there is something to edit.
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        let settings = AppSettings::default();
        match save_settings_to(path, &settings) {
            Ok(()) => tracing::info!(target: "system", "Wrote default settings to {:?}", path),
            Err(e) => tracing::warn!(target: "system", "Could not write {:?}: {}", path, e),
        }
        return settings;
    }

    match load_settings_from_file(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(target: "system", "Ignoring settings at {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

fn load_settings_from_file(path: &Path) -> Result<AppSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}
