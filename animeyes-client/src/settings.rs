use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::Tab;

/// `settings.json` is expected to be tiny; anything bigger is treated as
/// corrupt rather than read.
pub const MAX_SETTINGS_BYTES: u64 = 64 * 1024;

pub const DATA_DIR_ENV: &str = "ANIMEYES_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClientSettings {
    /// Last device origin or socket URL the user connected to.
    #[serde(default)]
    pub device_url: Option<String>,
    #[serde(default)]
    pub active_tab: Tab,
    #[serde(default)]
    pub lid_link: bool,
}

#[derive(Debug, Error)]
pub enum SettingsLoadError {
    #[error("metadata read failed: {0}")]
    Metadata(#[source] io::Error),
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("parse failed: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SettingsSaveError {
    #[error("serialize failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("tmp write failed: {0}")]
    WriteTmp(#[source] io::Error),
    #[error("rename failed: {0}")]
    Rename(#[source] io::Error),
}

fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let base = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("LOCALAPPDATA").map(PathBuf::from))
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("AnimEyes")
}

pub fn settings_path() -> PathBuf {
    let dir = data_dir();
    let _ = fs::create_dir_all(&dir);
    dir.join("settings.json")
}

/// Default log file, kept in a `logs` directory beside the settings file.
pub fn log_path_for(settings_file: &Path) -> PathBuf {
    settings_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("logs")
        .join("animeyes.log")
}

pub fn parse_settings_json(data: &str) -> Result<ClientSettings, serde_json::Error> {
    serde_json::from_str::<ClientSettings>(data)
}

pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings, SettingsLoadError> {
    let meta = fs::metadata(path).map_err(SettingsLoadError::Metadata)?;
    if meta.len() > MAX_SETTINGS_BYTES {
        return Err(SettingsLoadError::TooLarge {
            size: meta.len(),
            max: MAX_SETTINGS_BYTES,
        });
    }

    let data = fs::read_to_string(path).map_err(SettingsLoadError::Read)?;
    parse_settings_json(&data).map_err(SettingsLoadError::Parse)
}

/// Never fails: a missing file is normal, anything else is logged.
pub fn load_settings(path: &Path) -> ClientSettings {
    match load_settings_from_path(path) {
        Ok(settings) => settings,
        Err(SettingsLoadError::Metadata(err)) if err.kind() == io::ErrorKind::NotFound => {
            ClientSettings::default()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), "ignoring saved settings: {err}");
            ClientSettings::default()
        }
    }
}

pub fn save_settings_to_path(
    path: &Path,
    settings: &ClientSettings,
) -> Result<(), SettingsSaveError> {
    let tmp = path.with_extension("json.tmp");
    let payload =
        serde_json::to_string_pretty(settings).map_err(SettingsSaveError::Serialize)?;
    fs::write(&tmp, payload.as_bytes()).map_err(SettingsSaveError::WriteTmp)?;

    if path.exists() {
        let _ = fs::remove_file(path);
    }

    fs::rename(&tmp, path).map_err(SettingsSaveError::Rename)?;
    Ok(())
}

pub fn save_settings_with_retry(
    path: &Path,
    settings: &ClientSettings,
) -> Result<(), SettingsSaveError> {
    const MAX_ATTEMPTS: u32 = 3;
    const BACKOFF_BASE_MS: u64 = 50;

    let mut attempt = 1;
    loop {
        match save_settings_to_path(path, settings) {
            Ok(()) => return Ok(()),
            Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
            Err(err) => {
                tracing::debug!(attempt, "settings save failed, retrying: {err}");
                let backoff_ms = BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1));
                std::thread::sleep(Duration::from_millis(backoff_ms));
                attempt += 1;
            }
        }
    }
}
