#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use rundelivery_lib::{
    models::{Company, Coordinate, PositionSample},
    platform::{ChannelLocationSource, CountingWakeLock, RecordingNotifier},
    settings::TrackerSettings,
    utils::geo::offset_meters,
    AppState,
};

pub const DEPOT: Coordinate = Coordinate::new(-23.5505, -46.6333);

pub struct Harness {
    pub app: AppState,
    pub location: Arc<ChannelLocationSource>,
    pub wake_lock: Arc<CountingWakeLock>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl Harness {
    /// Fresh data directory, no company selected.
    pub async fn bare_with(location: ChannelLocationSource, wake_lock: CountingWakeLock) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let location = Arc::new(location);
        let wake_lock = Arc::new(wake_lock);
        let notifier = Arc::new(RecordingNotifier::new());

        let app = AppState::open(
            dir.path(),
            location.clone(),
            wake_lock.clone(),
            notifier.clone(),
        )
        .await
        .expect("open app state");

        Self {
            app,
            location,
            wake_lock,
            notifier,
            _dir: dir,
        }
    }

    pub async fn bare() -> Self {
        Self::bare_with(ChannelLocationSource::new(), CountingWakeLock::new()).await
    }

    /// Company "acme" with its depot at [`DEPOT`], selected, default settings.
    pub async fn new() -> Self {
        Self::with_settings(TrackerSettings::default()).await
    }

    pub async fn with_settings(settings: TrackerSettings) -> Self {
        let harness = Self::bare().await;
        harness.install_company().await;
        harness.app.settings.update_tracker(settings).expect("save settings");
        harness
    }

    pub async fn install_company(&self) {
        let company = Company {
            daily_rate: 120.0,
            delivery_fee: 4.5,
            ..Company::new("acme", "Acme Logistics")
        }
        .with_base_location(DEPOT);
        self.app.db.save_company(&company).await.expect("save company");
        self.app
            .tracking
            .select_company("acme")
            .await
            .expect("select company");
    }

    pub fn push(&self, sample: PositionSample) {
        assert!(self.location.push_sample(sample), "nobody is watching");
    }

    /// Waits until the location loop has processed a fix stamped `at`.
    pub async fn processed(&self, at: DateTime<Utc>) {
        let tracking = self.app.tracking.clone();
        eventually(|| {
            let tracking = tracking.clone();
            async move { tracking.snapshot().await.last_fix_at >= Some(at) }
        })
        .await;
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 9, 0, 0).unwrap()
}

/// Fix `north_m`/`east_m` from the depot, `secs` after [`t0`].
pub fn fix(north_m: f64, east_m: f64, secs: i64) -> PositionSample {
    PositionSample::new(
        offset_meters(&DEPOT, north_m, east_m),
        None,
        t0() + Duration::seconds(secs),
    )
}

pub fn fix_with_speed(north_m: f64, east_m: f64, secs: i64, speed_ms: f64) -> PositionSample {
    PositionSample {
        speed: Some(speed_ms),
        ..fix(north_m, east_m, secs)
    }
}

/// Leave the depot, stand 500 m north from t=20 to t=100. One stop.
pub fn single_stop_track() -> Vec<PositionSample> {
    let mut track = vec![fix(0.0, 0.0, 0), fix(250.0, 0.0, 10), fix(500.0, 0.0, 20)];
    track.extend((25..=100).step_by(5).map(|secs| fix(500.0, 0.0, secs)));
    track
}

/// Polls `check` until it holds. The DB lives on its own thread, so give it
/// real time as well as scheduler turns.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..1000 {
        if check().await {
            return;
        }
        std::thread::sleep(StdDuration::from_millis(2));
        tokio::task::yield_now().await;
    }
    panic!("condition not reached in time");
}
