mod common;

use common::{fix, single_stop_track, t0, Harness, DEPOT};
use rundelivery_lib::{
    models::{Company, StopStatus},
    platform::{ChannelLocationSource, CountingWakeLock, LocationError},
    settings::TrackerSettings,
    tracking::{TrackingError, TrackingStatus},
    utils::geo::distance_meters,
};

#[tokio::test]
async fn dwell_away_from_depot_becomes_pending_stop() {
    let h = Harness::new().await;
    let snapshot = h.app.tracking.start_tracking().await.unwrap();
    assert_eq!(snapshot.status, TrackingStatus::Active);
    assert_eq!(snapshot.origin, Some(DEPOT));

    let track = single_stop_track();
    let last = track.last().unwrap().timestamp;
    for sample in track {
        h.push(sample);
    }
    h.processed(last).await;
    let snapshot = h.app.tracking.stop_tracking().await.unwrap();

    let pending = h.app.review.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!((distance_meters(&pending[0].location, &DEPOT) - 500.0).abs() < 1.0);
    // emitted at the fix where the dwell reached 60 s (armed at t=25)
    assert_eq!(pending[0].detected_at(), Some(t0() + chrono::Duration::seconds(85)));

    assert_eq!(snapshot.stops_detected, 1);
    // review pending, so nothing counted yet
    assert_eq!(snapshot.deliveries, 0);
    assert_eq!(h.notifier.successes(), 1);
}

#[tokio::test]
async fn dwelling_at_the_depot_never_emits() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();

    for secs in (0..=300).step_by(5) {
        h.push(fix(20.0, 10.0, secs));
    }
    h.processed(t0() + chrono::Duration::seconds(300)).await;
    h.app.tracking.stop_tracking().await.unwrap();

    assert!(h.app.review.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn direct_count_mode_confirms_and_counts() {
    let h = Harness::with_settings(TrackerSettings {
        review_stops: false,
        ..TrackerSettings::default()
    })
    .await;
    h.app.tracking.start_tracking().await.unwrap();

    let track = single_stop_track();
    let last = track.last().unwrap().timestamp;
    for sample in track {
        h.push(sample);
    }
    h.processed(last).await;
    h.app.tracking.stop_tracking().await.unwrap();

    assert!(h.app.review.pending().await.unwrap().is_empty());
    let confirmed = h
        .app
        .review
        .list_by_status(StopStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(h.app.tracking.counter().get().await, 1);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();
    assert!(h.wake_lock.is_held());
    assert!(h.location.is_watching());

    h.app.tracking.stop_tracking().await.unwrap();
    h.app.tracking.stop_tracking().await.unwrap();
    let snapshot = h.app.tracking.stop_tracking().await.unwrap();

    assert_eq!(snapshot.status, TrackingStatus::Paused);
    assert_eq!(snapshot.origin, None);
    assert_eq!(h.wake_lock.acquired(), 1);
    assert_eq!(h.wake_lock.released(), 1);
    assert_eq!(h.location.clear_calls(), 1);
    assert!(!h.location.is_watching());
}

#[tokio::test]
async fn second_start_is_rejected() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(err, TrackingError::AlreadyActive));
    assert_eq!(h.location.watch_calls(), 1);
    assert_eq!(h.wake_lock.acquired(), 1);

    h.app.tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn toggle_alternates() {
    let h = Harness::new().await;
    assert_eq!(
        h.app.tracking.toggle_tracking().await.unwrap().status,
        TrackingStatus::Active
    );
    assert_eq!(
        h.app.tracking.toggle_tracking().await.unwrap().status,
        TrackingStatus::Paused
    );
    assert_eq!(h.wake_lock.released(), 1);
}

#[tokio::test]
async fn start_without_company_stays_paused() {
    let h = Harness::bare().await;

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(err, TrackingError::NoCompanySelected));
    assert_eq!(h.app.tracking.status().await, TrackingStatus::Paused);
    assert_eq!(h.notifier.errors(), 1);
    assert_eq!(h.location.watch_calls(), 0);
    assert_eq!(h.wake_lock.acquired(), 0);
}

#[tokio::test]
async fn start_without_base_location_fails() {
    let h = Harness::bare().await;
    h.app
        .db
        .save_company(&Company::new("nobase", "No Base Co"))
        .await
        .unwrap();
    h.app.tracking.select_company("nobase").await.unwrap();

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(err, TrackingError::MissingBaseLocation(name) if name == "No Base Co"));
    assert_eq!(h.app.tracking.status().await, TrackingStatus::Paused);
}

#[tokio::test]
async fn start_with_deleted_company_fails() {
    let h = Harness::new().await;
    h.app.db.delete_company("acme").await.unwrap();

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(err, TrackingError::CompanyNotFound(id) if id == "acme"));
}

#[tokio::test]
async fn start_without_location_services_fails() {
    let h = Harness::bare_with(ChannelLocationSource::unavailable(), CountingWakeLock::new()).await;
    h.install_company().await;

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(err, TrackingError::LocationUnavailable));
    assert_eq!(h.app.tracking.status().await, TrackingStatus::Paused);
    assert_eq!(h.notifier.errors(), 1);
}

#[tokio::test]
async fn permission_denied_at_start_keeps_previous_stops() {
    let h = Harness::new().await;
    let stop = rundelivery_lib::models::Stop::pending(DEPOT, t0());
    h.app.db.insert_stop(&stop).await.unwrap();
    h.location.fail_next_watch(LocationError::PermissionDenied);

    let err = h.app.tracking.start_tracking().await.unwrap_err();
    assert!(matches!(
        err,
        TrackingError::Location(LocationError::PermissionDenied)
    ));
    assert_eq!(h.app.review.pending().await.unwrap().len(), 1);
    assert_eq!(h.wake_lock.acquired(), 0);
}

#[tokio::test]
async fn missing_wake_lock_support_is_not_an_error() {
    let h = Harness::bare_with(ChannelLocationSource::new(), CountingWakeLock::unsupported()).await;
    h.install_company().await;

    h.app.tracking.start_tracking().await.unwrap();
    h.app.tracking.stop_tracking().await.unwrap();
    assert_eq!(h.wake_lock.released(), 0);
}

#[tokio::test]
async fn start_clears_previous_day() {
    let h = Harness::new().await;
    let stop = rundelivery_lib::models::Stop::pending(DEPOT, t0());
    h.app.db.insert_stop(&stop).await.unwrap();
    h.app.tracking.counter().increment().await.unwrap();

    h.app.tracking.start_tracking().await.unwrap();

    assert!(h.app.review.pending().await.unwrap().is_empty());
    assert_eq!(h.app.tracking.counter().get().await, 0);
    h.app.tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn gps_error_is_transient() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();

    assert!(h.location.push_error(LocationError::Timeout));
    assert!(h.location.push_error(LocationError::Timeout));
    let tracking = h.app.tracking.clone();
    common::eventually(|| {
        let tracking = tracking.clone();
        async move { tracking.status().await == TrackingStatus::GpsError }
    })
    .await;

    let snapshot = h.app.tracking.snapshot().await;
    assert_eq!(snapshot.label, "GPS error");
    assert!(snapshot.last_error.is_some());
    // subscription left in place for the platform to recover
    assert!(h.location.is_watching());
    assert_eq!(h.location.clear_calls(), 0);

    h.push(fix(0.0, 0.0, 30));
    h.processed(t0() + chrono::Duration::seconds(30)).await;
    assert_eq!(h.app.tracking.status().await, TrackingStatus::Active);
    // only the transition into the error is signalled
    assert_eq!(h.notifier.errors(), 1);

    h.app.tracking.stop_tracking().await.unwrap();
    assert_eq!(h.wake_lock.released(), 1);
}

#[tokio::test]
async fn samples_after_stop_are_not_delivered() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();
    h.app.tracking.stop_tracking().await.unwrap();

    assert!(!h.location.push_sample(fix(500.0, 0.0, 0)));
    assert_eq!(h.app.tracking.snapshot().await.last_fix_at, None);
}

#[tokio::test]
async fn closed_stream_ends_the_session_and_releases_the_wake_lock() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();
    assert!(h.wake_lock.is_held());

    assert!(h.location.close_stream());
    let wake_lock = h.wake_lock.clone();
    common::eventually(|| {
        let wake_lock = wake_lock.clone();
        async move { !wake_lock.is_held() }
    })
    .await;

    let snapshot = h.app.tracking.snapshot().await;
    assert_eq!(snapshot.status, TrackingStatus::Paused);
    assert_eq!(snapshot.origin, None);
    assert!(snapshot.last_error.is_some());
    assert_eq!(h.wake_lock.released(), 1);
    assert_eq!(h.notifier.errors(), 1);

    // a later stop cleans up without releasing twice
    h.app.tracking.stop_tracking().await.unwrap();
    assert_eq!(h.wake_lock.released(), 1);

    // and tracking can start again
    h.app.tracking.start_tracking().await.unwrap();
    assert_eq!(h.location.watch_calls(), 2);
    assert!(h.wake_lock.is_held());
    h.app.tracking.stop_tracking().await.unwrap();
    assert_eq!(h.wake_lock.released(), 2);
}

#[tokio::test]
async fn restart_after_closed_stream_needs_no_explicit_stop() {
    let h = Harness::new().await;
    h.app.tracking.start_tracking().await.unwrap();
    h.location.close_stream();

    let tracking = h.app.tracking.clone();
    common::eventually(|| {
        let tracking = tracking.clone();
        async move { tracking.status().await == TrackingStatus::Paused }
    })
    .await;

    let snapshot = h.app.tracking.toggle_tracking().await.unwrap();
    assert_eq!(snapshot.status, TrackingStatus::Active);
    assert_eq!(h.location.clear_calls(), 1);
    h.app.tracking.stop_tracking().await.unwrap();
    assert_eq!(h.wake_lock.acquired(), 2);
    assert_eq!(h.wake_lock.released(), 2);
}
