use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMode {
    /// Dwell measured against the last checkpoint that moved more than 50 m.
    #[default]
    Displacement,
    /// Dwell timer started whenever reported speed drops to 2 km/h or less.
    Speed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub auto_count: bool,
    pub stop_duration_secs: u64,
    pub base_radius_m: f64,
    /// Store detections as pending for audit instead of counting them right away.
    pub review_stops: bool,
    pub detection_mode: DetectionMode,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            auto_count: true,
            stop_duration_secs: 60,
            base_radius_m: 200.0,
            review_stops: true,
            detection_mode: DetectionMode::Displacement,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    tracker: TrackerSettings,
    active_company_id: Option<String>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.read().tracker.clone()
    }

    pub fn update_tracker(&self, settings: TrackerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.tracker = settings;
        self.persist(&guard)
    }

    pub fn active_company_id(&self) -> Option<String> {
        self.read().active_company_id.clone()
    }

    pub fn set_active_company_id(&self, company_id: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.active_company_id = company_id;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let tracker = store.tracker();
        assert!(tracker.auto_count);
        assert_eq!(tracker.stop_duration_secs, 60);
        assert_eq!(tracker.base_radius_m, 200.0);
        assert!(tracker.review_stops);
        assert_eq!(tracker.detection_mode, DetectionMode::Displacement);
        assert_eq!(store.active_company_id(), None);
    }

    #[test]
    fn updates_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        {
            let store = SettingsStore::new(path.clone()).unwrap();
            store
                .update_tracker(TrackerSettings {
                    auto_count: false,
                    stop_duration_secs: 90,
                    base_radius_m: 350.0,
                    review_stops: false,
                    detection_mode: DetectionMode::Speed,
                })
                .unwrap();
            store.set_active_company_id(Some("acme".into())).unwrap();
        }

        let store = SettingsStore::new(path).unwrap();
        let tracker = store.tracker();
        assert!(!tracker.auto_count);
        assert_eq!(tracker.stop_duration_secs, 90);
        assert_eq!(tracker.detection_mode, DetectionMode::Speed);
        assert_eq!(store.active_company_id().as_deref(), Some("acme"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"tracker":{"stopDuration":1,"baseRadiusM":50}}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        let tracker = store.tracker();
        assert_eq!(tracker.base_radius_m, 50.0);
        assert_eq!(tracker.stop_duration_secs, 60);
        assert!(tracker.auto_count);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.tracker(), TrackerSettings::default());
    }
}
