use std::{pin::Pin, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, Mutex},
    time::{self, Sleep},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::Database,
    models::{Coordinate, PositionSample, Stop, StopStatus},
    platform::{LocationError, LocationEvent, Notifier, WakeLockGuard},
};

use super::{
    counter::DeliveryCounter,
    speed_dwell::TimerOutcome,
    state::{DetectorStep, SessionDetector, TrackingState},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub(crate) struct LoopContext {
    pub state: Arc<Mutex<TrackingState>>,
    pub db: Database,
    pub counter: DeliveryCounter,
    pub notifier: Arc<dyn Notifier>,
    pub generation: u64,
    pub review_stops: bool,
    pub cancel_token: CancellationToken,
    /// Held until the loop returns, whatever ends it.
    pub wake_lock: Option<WakeLockGuard>,
}

struct DwellTimer {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

/// Drains one session's location events in delivery order. At most one dwell
/// timer is armed at a time and it lives inside this loop, so cancelling the
/// token drops it together with the subscription.
pub(crate) async fn location_loop(
    ctx: LoopContext,
    mut events: mpsc::UnboundedReceiver<LocationEvent>,
) {
    let mut dwell: Option<DwellTimer> = None;

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => {
                log_info!("location loop shutting down (session {})", ctx.generation);
                break;
            }
            event = events.recv() => match event {
                Some(LocationEvent::Sample(sample)) => {
                    if let Some(timer) = handle_sample(&ctx, sample).await {
                        dwell = Some(timer);
                    }
                }
                Some(LocationEvent::Error(err)) => handle_error(&ctx, err).await,
                None => {
                    log_warn!("location stream closed (session {})", ctx.generation);
                    abandon_session(&ctx).await;
                    break;
                }
            },
            generation = wait_for_dwell(&mut dwell) => {
                dwell = None;
                handle_dwell_elapsed(&ctx, generation).await;
            }
        }
    }
}

async fn wait_for_dwell(dwell: &mut Option<DwellTimer>) -> u64 {
    match dwell.as_mut() {
        Some(timer) => {
            timer.sleep.as_mut().await;
            timer.generation
        }
        None => std::future::pending().await,
    }
}

async fn handle_sample(ctx: &LoopContext, sample: PositionSample) -> Option<DwellTimer> {
    let step = {
        let mut state = ctx.state.lock().await;
        if !state.is_current(ctx.generation) {
            return None;
        }
        state.record_fix(sample.timestamp);
        match state.detector.as_mut() {
            Some(detector) => detector.observe(&sample),
            None => DetectorStep::Nothing,
        }
    };

    match step {
        DetectorStep::Nothing => None,
        DetectorStep::Suppressed(gate) => {
            log_debug!("stop at {} suppressed: {gate:?}", sample.coordinate);
            None
        }
        DetectorStep::Candidate(location) => {
            record_candidate(ctx, location, sample.timestamp).await;
            None
        }
        DetectorStep::ArmTimer { generation, delay } => {
            log_debug!("dwell timer {generation} armed for {}s", delay.as_secs());
            Some(DwellTimer {
                generation,
                sleep: Box::pin(time::sleep(delay)),
            })
        }
    }
}

async fn handle_error(ctx: &LoopContext, err: LocationError) {
    let entered_error = {
        let mut state = ctx.state.lock().await;
        if !state.is_current(ctx.generation) {
            return;
        }
        state.record_error(err)
    };

    if entered_error {
        log_warn!("GPS error: {err}");
        ctx.notifier.notify_error();
    } else {
        log_debug!("GPS still failing: {err}");
    }
}

/// Nothing can arrive on a closed stream, so the session ends here rather
/// than waiting in `GpsError`.
async fn abandon_session(ctx: &LoopContext) {
    {
        let mut state = ctx.state.lock().await;
        if !state.is_current(ctx.generation) {
            return;
        }
        state.abandon_session(LocationError::PositionUnavailable);
    }
    ctx.notifier.notify_error();
}

async fn handle_dwell_elapsed(ctx: &LoopContext, generation: u64) {
    let outcome = {
        let mut state = ctx.state.lock().await;
        if !state.is_current(ctx.generation) {
            return;
        }
        match state.detector.as_mut() {
            Some(SessionDetector::Speed(detector)) => detector.timer_fired(generation),
            _ => TimerOutcome::Stale,
        }
    };

    match outcome {
        TimerOutcome::Candidate(location) => record_candidate(ctx, location, Utc::now()).await,
        TimerOutcome::Suppressed(gate) => log_debug!("dwell timer {generation} suppressed: {gate:?}"),
        TimerOutcome::Stale => log_debug!("dwell timer {generation} is stale"),
    }
}

async fn record_candidate(ctx: &LoopContext, location: Coordinate, detected_at: DateTime<Utc>) {
    match persist_candidate(ctx, location, detected_at).await {
        Ok(stop) => {
            {
                let mut state = ctx.state.lock().await;
                if state.is_current(ctx.generation) {
                    state.stops_detected += 1;
                }
            }
            log_info!("stop {} detected at {location} ({})", stop.id, stop.status.as_str());
            ctx.notifier.notify_success();
        }
        Err(err) => log_error!("failed to record stop at {location}: {err:?}"),
    }
}

async fn persist_candidate(
    ctx: &LoopContext,
    location: Coordinate,
    detected_at: DateTime<Utc>,
) -> Result<Stop> {
    let status = if ctx.review_stops {
        StopStatus::Pending
    } else {
        StopStatus::Confirmed
    };
    let stop = Stop::new(location, detected_at, status);

    ctx.db
        .insert_stop(&stop)
        .await
        .context("failed to persist stop")?;

    if status == StopStatus::Confirmed {
        ctx.counter
            .increment()
            .await
            .context("failed to count stop")?;
    }

    Ok(stop)
}
