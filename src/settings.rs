//! Runtime stream settings
//!
//! One [`SettingsStore`] is created at startup and shared (behind an `Arc`)
//! with the router and every pipeline controller. Readers always see the
//! latest in-memory value; writes are persisted as JSON on a best-effort
//! basis and a persistence failure never rolls the value back.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Environment variable overriding the settings location (file or directory)
pub const CONFIG_ENV_VAR: &str = "MJPEG_RELAY_CONFIG";

/// File name used inside directories
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_MAX_DIMENSION: u32 = 1920;
pub const DEFAULT_VIDEO_QUALITY: f64 = 0.75;
pub const DEFAULT_TARGET_FPS: u32 = 60;
pub const DEFAULT_DROP_FRAMES_WHEN_BUSY: bool = true;

fn default_target_fps() -> u32 {
    DEFAULT_TARGET_FPS
}

fn default_drop_frames_when_busy() -> bool {
    DEFAULT_DROP_FRAMES_WHEN_BUSY
}

/// Stream settings, serialized with the camelCase names used by the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Longest output edge in pixels (0 = native size)
    pub max_dimension: u32,

    /// Encoder quality in (0, 1]
    pub video_quality: f64,

    /// Capture rate requested from the source
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Keep only the newest frame while the pipeline is busy
    #[serde(default = "default_drop_frames_when_busy")]
    pub drop_frames_when_busy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            video_quality: DEFAULT_VIDEO_QUALITY,
            target_fps: DEFAULT_TARGET_FPS,
            drop_frames_when_busy: DEFAULT_DROP_FRAMES_WHEN_BUSY,
        }
    }
}

impl Settings {
    /// Decode and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Encode as a compact JSON object
    pub fn to_json(&self) -> String {
        // Plain numeric/bool fields: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Reject values the pipeline cannot use
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.video_quality > 0.0 && self.video_quality <= 1.0) {
            return Err(SettingsError::OutOfRange("videoQuality must be in (0, 1]"));
        }
        if self.target_fps == 0 {
            return Err(SettingsError::OutOfRange("targetFps must be positive"));
        }
        Ok(())
    }

    /// Minimum interval between captured frames (`1 / targetFps`)
    pub fn minimum_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

/// Lock-guarded, persisted settings record
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<Settings>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable. Later writes are persisted to the same path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let settings = match load_from_file(&path) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), "Loaded settings");
                settings
            }
            Err(SettingsError::Load { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        };

        Self {
            current: RwLock::new(settings),
            path: Some(path),
        }
    }

    /// Store that never touches the filesystem
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
            path: None,
        }
    }

    /// Where writes are persisted, if anywhere
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current settings
    pub fn get(&self) -> Settings {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings and persist them.
    ///
    /// The write lock is held across persistence so files are written in the
    /// same order as the in-memory updates.
    pub fn set(&self, settings: Settings) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = settings;

        if let Err(e) = self.persist(&settings) {
            tracing::warn!(error = %e, "Settings updated in memory only");
        }
    }

    /// Decode `json` and, if valid, replace the current settings.
    /// Invalid input leaves the store untouched.
    pub fn update_from_json(&self, json: &str) -> Result<Settings, SettingsError> {
        let settings = Settings::from_json(json)?;
        self.set(settings);
        Ok(settings)
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(settings)?;
        std::fs::write(path, data).map_err(|source| SettingsError::Persist {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Settings persisted");
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory(Settings::default())
    }
}

/// Read and validate a settings file
pub fn load_from_file(path: &Path) -> Result<Settings, SettingsError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    Settings::from_json(&contents)
}

/// Determine where settings live.
///
/// Order: `MJPEG_RELAY_CONFIG`, an existing `./config.json`, the per-user data
/// directory, and finally `./config.json`.
pub fn resolve_path() -> PathBuf {
    let env_override = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let data_dir = directories::ProjectDirs::from("", "", "mjpeg-relay")
        .map(|dirs| dirs.data_dir().to_path_buf());

    resolve_path_with(env_override, &cwd, data_dir)
}

fn resolve_path_with(env_override: Option<PathBuf>, cwd: &Path, data_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = env_override {
        if path.is_dir() {
            return path.join(CONFIG_FILE_NAME);
        }
        return path;
    }

    let local = cwd.join(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    if let Some(dir) = data_dir {
        match std::fs::create_dir_all(&dir) {
            Ok(()) => return dir.join(CONFIG_FILE_NAME),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot create data directory");
            }
        }
    }

    local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.max_dimension, 1920);
        assert_eq!(settings.video_quality, 0.75);
        assert_eq!(settings.target_fps, 60);
        assert!(settings.drop_frames_when_busy);
    }

    #[test]
    fn test_json_field_names() {
        let json = Settings::default().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["maxDimension"], 1920);
        assert_eq!(value["videoQuality"], 0.75);
        assert_eq!(value["targetFps"], 60);
        assert_eq!(value["dropFramesWhenBusy"], true);
    }

    #[test]
    fn test_optional_fields_default() {
        let settings = Settings::from_json(r#"{"maxDimension": 1280, "videoQuality": 0.5}"#).unwrap();

        assert_eq!(settings.max_dimension, 1280);
        assert_eq!(settings.video_quality, 0.5);
        assert_eq!(settings.target_fps, DEFAULT_TARGET_FPS);
        assert!(settings.drop_frames_when_busy);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(Settings::from_json("not json"), Err(SettingsError::Decode(_))));
        assert!(matches!(Settings::from_json(r#"{"videoQuality": 0.5}"#), Err(SettingsError::Decode(_))));
        assert!(matches!(
            Settings::from_json(r#"{"maxDimension": -1, "videoQuality": 0.5}"#),
            Err(SettingsError::Decode(_))
        ));
        assert!(matches!(
            Settings::from_json(r#"{"maxDimension": 0, "videoQuality": 0}"#),
            Err(SettingsError::OutOfRange(_))
        ));
        assert!(matches!(
            Settings::from_json(r#"{"maxDimension": 0, "videoQuality": 1.5}"#),
            Err(SettingsError::OutOfRange(_))
        ));
        assert!(matches!(
            Settings::from_json(r#"{"maxDimension": 0, "videoQuality": 1, "targetFps": 0}"#),
            Err(SettingsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_minimum_frame_interval() {
        let settings = Settings {
            target_fps: 50,
            ..Settings::default()
        };
        assert_eq!(settings.minimum_frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_open_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("config.json"));

        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn test_open_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();

        let store = SettingsStore::open(&path);
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn test_set_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = SettingsStore::open(&path);
        let updated = Settings {
            max_dimension: 720,
            video_quality: 0.9,
            target_fps: 24,
            drop_frames_when_busy: false,
        };
        store.set(updated);

        assert_eq!(store.get(), updated);
        assert_eq!(load_from_file(&path).unwrap(), updated);
        assert_eq!(SettingsStore::open(&path).get(), updated);
    }

    #[test]
    fn test_persist_failure_keeps_in_memory_value() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so every write fails.
        let store = SettingsStore::open(dir.path().join("missing").join("config.json"));

        let updated = Settings {
            max_dimension: 0,
            ..Settings::default()
        };
        store.set(updated);

        assert_eq!(store.get(), updated);
    }

    #[test]
    fn test_update_from_json_invalid_leaves_store_unchanged() {
        let store = SettingsStore::default();
        let before = store.get();

        assert!(store.update_from_json(r#"{"maxDimension": "big"}"#).is_err());
        assert_eq!(store.get(), before);

        let applied = store
            .update_from_json(r#"{"maxDimension": 640, "videoQuality": 0.6, "targetFps": 30, "dropFramesWhenBusy": false}"#)
            .unwrap();
        assert_eq!(store.get(), applied);
        assert_eq!(applied.max_dimension, 640);
    }

    #[test]
    fn test_resolve_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();

        let resolved = resolve_path_with(Some(dir.path().to_path_buf()), cwd.path(), None);
        assert_eq!(resolved, dir.path().join(CONFIG_FILE_NAME));

        let file = dir.path().join("custom.json");
        let resolved = resolve_path_with(Some(file.clone()), cwd.path(), None);
        assert_eq!(resolved, file);
    }

    #[test]
    fn test_resolve_prefers_existing_local_file() {
        let cwd = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        std::fs::write(cwd.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        let resolved = resolve_path_with(None, cwd.path(), Some(data.path().to_path_buf()));
        assert_eq!(resolved, cwd.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_resolve_data_dir_then_cwd() {
        let cwd = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let app_dir = data.path().join("mjpeg-relay");

        let resolved = resolve_path_with(None, cwd.path(), Some(app_dir.clone()));
        assert_eq!(resolved, app_dir.join(CONFIG_FILE_NAME));
        assert!(app_dir.is_dir());

        let resolved = resolve_path_with(None, cwd.path(), None);
        assert_eq!(resolved, cwd.path().join(CONFIG_FILE_NAME));
    }
}
