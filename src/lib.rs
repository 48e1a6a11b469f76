#[cfg(feature = "audio")]
pub mod audio;
pub mod db;
pub mod models;
pub mod platform;
pub mod review;
pub mod settings;
pub mod tracking;
pub mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

use db::Database;
use platform::{LocationSource, Notifier, WakeLock};
use review::StopReview;
use settings::SettingsStore;
use tracking::{DeliveryCounter, TrackingController};

/// Everything a front end needs, wired against one data directory.
pub struct AppState {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub tracking: TrackingController,
    pub review: StopReview,
}

impl AppState {
    pub async fn open(
        data_dir: &Path,
        location: Arc<dyn LocationSource>,
        wake_lock: Arc<dyn WakeLock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("rundelivery.sqlite3"))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
        let counter = DeliveryCounter::load(db.clone()).await?;

        let tracking = TrackingController::new(
            db.clone(),
            counter.clone(),
            settings.clone(),
            location,
            wake_lock,
            notifier.clone(),
        );
        let review = StopReview::new(db.clone(), counter, notifier);

        Ok(Self {
            db,
            settings,
            tracking,
            review,
        })
    }
}

/// Info by default; `RUST_LOG` overrides.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
