use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use log::{error, info, warn};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    db::Database,
    models::{Company, Coordinate, DailyEntry, DailyEntryInput, Stop, StopStatus},
    platform::{LocationSource, Notifier, WakeLock, WakeLockGuard, WatchId},
    settings::SettingsStore,
};

use super::{
    counter::DeliveryCounter,
    loop_worker::{location_loop, LoopContext},
    TrackingError, TrackingState, TrackingStatus,
};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub status: TrackingStatus,
    pub label: &'static str,
    pub company_id: Option<String>,
    pub origin: Option<Coordinate>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_fix_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub stops_detected: u32,
    pub deliveries: u32,
}

/// Everything the end-of-day form needs, plus an entry prefilled from the
/// active company.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DayHandoff {
    pub deliveries: u32,
    pub confirmed_stops: Vec<Stop>,
    pub pending_stops: Vec<Stop>,
    pub suggested: DailyEntryInput,
}

/// The wake-lock guard lives in the loop task, so it is released on every
/// way the loop can exit.
struct ActiveSession {
    watch_id: WatchId,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single tracking session.
///
/// Lock order is `session` then `state`; the location loop only ever takes
/// `state`, so `stop_tracking` can join the loop while holding `session`.
#[derive(Clone)]
pub struct TrackingController {
    state: Arc<Mutex<TrackingState>>,
    session: Arc<Mutex<Option<ActiveSession>>>,
    db: Database,
    counter: DeliveryCounter,
    settings: Arc<SettingsStore>,
    location: Arc<dyn LocationSource>,
    wake_lock: Arc<dyn WakeLock>,
    notifier: Arc<dyn Notifier>,
}

impl TrackingController {
    pub fn new(
        db: Database,
        counter: DeliveryCounter,
        settings: Arc<SettingsStore>,
        location: Arc<dyn LocationSource>,
        wake_lock: Arc<dyn WakeLock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackingState::new())),
            session: Arc::new(Mutex::new(None)),
            db,
            counter,
            settings,
            location,
            wake_lock,
            notifier,
        }
    }

    pub fn counter(&self) -> &DeliveryCounter {
        &self.counter
    }

    pub async fn status(&self) -> TrackingStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> TrackingSnapshot {
        let deliveries = self.counter.get().await;
        let state = self.state.lock().await;
        TrackingSnapshot {
            status: state.status,
            label: state.status.label(),
            company_id: state.company_id.clone(),
            origin: state.origin,
            started_at: state.started_at,
            last_fix_at: state.last_fix_at,
            last_error: state.last_error.map(|err| err.to_string()),
            stops_detected: state.stops_detected,
            deliveries,
        }
    }

    /// Makes `company_id` the company whose depot anchors the next session.
    pub async fn select_company(&self, company_id: &str) -> Result<Company, TrackingError> {
        let company = self
            .db
            .get_company(company_id)
            .await?
            .ok_or_else(|| TrackingError::CompanyNotFound(company_id.to_string()))?;
        self.settings
            .set_active_company_id(Some(company.id.clone()))?;
        Ok(company)
    }

    pub async fn start_tracking(&self) -> Result<TrackingSnapshot, TrackingError> {
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            if self.state.lock().await.status.is_tracking() {
                *session = Some(active);
                return Err(TrackingError::AlreadyActive);
            }
            // the previous loop already ended its session on its own
            if let Err(err) = self.teardown(active).await {
                error!("Failed to reap ended session: {err:?}");
            }
        }

        let (company, origin) = match self.resolve_origin().await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("Cannot start tracking: {err}");
                self.notifier.notify_error();
                return Err(err);
            }
        };

        let watch = match self.location.watch_position() {
            Ok(watch) => watch,
            Err(err) => {
                warn!("Location subscription refused: {err}");
                self.notifier.notify_error();
                return Err(err.into());
            }
        };

        if let Err(err) = self.reset_day_progress().await {
            self.location.clear_watch(watch.id);
            return Err(err.into());
        }

        let settings = self.settings.tracker();
        let review_stops = settings.review_stops;
        let generation = self.state.lock().await.begin_session(
            company.id.clone(),
            origin,
            settings,
            Utc::now(),
        );

        let wake_lock = WakeLockGuard::acquire(self.wake_lock.clone());
        if wake_lock.is_none() {
            info!("Wake lock unavailable; continuing without it");
        }

        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            state: self.state.clone(),
            db: self.db.clone(),
            counter: self.counter.clone(),
            notifier: self.notifier.clone(),
            generation,
            review_stops,
            cancel_token: cancel_token.clone(),
            wake_lock,
        };
        let handle = tokio::spawn(location_loop(ctx, watch.events));

        *session = Some(ActiveSession {
            watch_id: watch.id,
            cancel_token,
            handle,
        });
        drop(session);

        info!(
            "Tracking started for {} from depot {origin} (session {generation})",
            company.name
        );
        Ok(self.snapshot().await)
    }

    /// Safe to call repeatedly; only the first call after a start tears
    /// anything down. Stops already recorded are kept for review.
    pub async fn stop_tracking(&self) -> Result<TrackingSnapshot> {
        {
            let mut session = self.session.lock().await;
            if let Some(active) = session.take() {
                self.state.lock().await.end_session();
                self.teardown(active).await?;
                info!("Tracking stopped");
            }
        }

        Ok(self.snapshot().await)
    }

    pub async fn toggle_tracking(&self) -> Result<TrackingSnapshot, TrackingError> {
        if self.status().await.is_tracking() {
            Ok(self.stop_tracking().await?)
        } else {
            self.start_tracking().await
        }
    }

    /// Counts a delivery the driver reports by hand. Proximity gates don't
    /// apply. While tracking, the current position is recorded as a
    /// confirmed stop when the device can produce one.
    pub async fn manual_increment(&self) -> Result<u32> {
        let count = self.counter.increment().await?;

        if self.status().await.is_tracking() {
            let location = self.location.clone();
            match tokio::task::spawn_blocking(move || location.current_position()).await {
                Ok(Ok(position)) => {
                    let stop = Stop::new(position, Utc::now(), StopStatus::Confirmed);
                    if let Err(err) = self.db.insert_stop(&stop).await {
                        error!("Failed to tag manual delivery at {position}: {err:?}");
                    }
                }
                Ok(Err(err)) => warn!("Manual delivery counted without a position: {err}"),
                Err(join_err) => error!("Position lookup task failed: {join_err}"),
            }
        }

        self.notifier.notify_success();
        Ok(count)
    }

    pub async fn manual_decrement(&self) -> Result<u32> {
        self.counter.decrement().await
    }

    /// Stops tracking and gathers the day's count and stops for the end-of-day form.
    pub async fn begin_end_day(&self) -> Result<DayHandoff> {
        self.stop_tracking().await?;

        let deliveries = self.counter.get().await;
        let confirmed_stops = self.db.list_stops_by_status(StopStatus::Confirmed).await?;
        let pending_stops = self.db.list_stops_by_status(StopStatus::Pending).await?;

        let company = match self.settings.active_company_id() {
            Some(company_id) => self.db.get_company(&company_id).await?,
            None => None,
        };

        let mut suggested = DailyEntryInput {
            date: Some(Local::now().date_naive()),
            deliveries_count: Some(deliveries),
            ..DailyEntryInput::default()
        };
        if let Some(company) = company {
            suggested.daily_rate = company.default_daily_rate();
            suggested.delivery_fee = company.delivery_fee;
            suggested.company_id = Some(company.id);
        }

        Ok(DayHandoff {
            deliveries,
            confirmed_stops,
            pending_stops,
            suggested,
        })
    }

    /// Saves the day's entry, then starts the next day from zero.
    pub async fn finalize_day(&self, input: DailyEntryInput) -> Result<DailyEntry> {
        self.stop_tracking().await?;

        let date = input.date.unwrap_or_else(|| Local::now().date_naive());
        let tracked = self.counter.get().await;
        let entry = DailyEntry::from_input(date, input, tracked);

        self.db.save_daily_entry(&entry).await?;
        self.reset_day_progress().await?;

        info!(
            "Day {} finalized: {} deliveries, {:.2} earned",
            entry.id, entry.deliveries_count, entry.total_earned
        );
        Ok(entry)
    }

    /// Unsubscribes and joins the loop. Joining drops the loop's wake-lock guard.
    async fn teardown(&self, active: ActiveSession) -> Result<()> {
        let ActiveSession {
            watch_id,
            cancel_token,
            handle,
        } = active;

        cancel_token.cancel();
        self.location.clear_watch(watch_id);
        handle
            .await
            .context("location loop task failed to join")
    }

    async fn resolve_origin(&self) -> Result<(Company, Coordinate), TrackingError> {
        if !self.location.is_available() {
            return Err(TrackingError::LocationUnavailable);
        }

        let company_id = self
            .settings
            .active_company_id()
            .ok_or(TrackingError::NoCompanySelected)?;
        let company = self
            .db
            .get_company(&company_id)
            .await?
            .ok_or(TrackingError::CompanyNotFound(company_id))?;
        let origin = company
            .base_location
            .ok_or_else(|| TrackingError::MissingBaseLocation(company.name.clone()))?;

        Ok((company, origin))
    }

    async fn reset_day_progress(&self) -> Result<()> {
        let cleared = self
            .db
            .clear_stops()
            .await
            .context("failed to clear stops")?;
        self.counter
            .reset()
            .await
            .context("failed to reset delivery counter")?;
        if cleared > 0 {
            info!("Cleared {cleared} stops from the previous session");
        }
        Ok(())
    }
}
