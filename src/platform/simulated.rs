//! Synthetic and recorded tracks for replaying a delivery day without a device.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    models::{Coordinate, PositionSample},
    utils::geo::{distance_meters, offset_meters},
};

pub struct TrackBuilder {
    rng: StdRng,
    position: Coordinate,
    time: DateTime<Utc>,
    interval_secs: i64,
    jitter_m: f64,
    samples: Vec<PositionSample>,
}

impl TrackBuilder {
    pub fn new(start: Coordinate, start_time: DateTime<Utc>, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            position: start,
            time: start_time,
            interval_secs: 5,
            jitter_m: 0.0,
            samples: Vec::new(),
        }
    }

    pub fn sample_interval(mut self, secs: i64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    /// GPS noise applied to every emitted fix, in metres per axis.
    pub fn jitter(mut self, meters: f64) -> Self {
        self.jitter_m = meters.abs();
        self
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    /// Straight-line drive at a constant speed, one fix per interval.
    pub fn drive_to(&mut self, target: Coordinate, speed_kmh: f64) -> &mut Self {
        let distance = distance_meters(&self.position, &target);
        let speed_ms = (speed_kmh / 3.6).max(0.1);
        let step_m = speed_ms * self.interval_secs as f64;
        let steps = (distance / step_m).ceil().max(1.0) as usize;
        let start = self.position;

        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            let point = Coordinate::new(
                start.latitude + (target.latitude - start.latitude) * t,
                start.longitude + (target.longitude - start.longitude) * t,
            );
            self.advance(point, Some(speed_ms));
        }
        self
    }

    /// Drive `north_m`/`east_m` away from the current position.
    pub fn drive_by(&mut self, north_m: f64, east_m: f64, speed_kmh: f64) -> &mut Self {
        let target = offset_meters(&self.position, north_m, east_m);
        self.drive_to(target, speed_kmh)
    }

    /// Stand still for `secs`, emitting jittered fixes with near-zero speed.
    pub fn dwell(&mut self, secs: i64) -> &mut Self {
        let steps = (secs / self.interval_secs).max(1);
        let here = self.position;
        for _ in 0..steps {
            self.advance(here, Some(0.0));
        }
        self
    }

    pub fn build(self) -> Vec<PositionSample> {
        self.samples
    }

    fn advance(&mut self, point: Coordinate, speed: Option<f64>) {
        self.time += Duration::seconds(self.interval_secs);
        self.position = point;

        let noisy = if self.jitter_m > 0.0 {
            let north = self.rng.gen_range(-self.jitter_m..=self.jitter_m);
            let east = self.rng.gen_range(-self.jitter_m..=self.jitter_m);
            offset_meters(&point, north, east)
        } else {
            point
        };

        self.samples.push(PositionSample::new(noisy, speed, self.time));
    }
}

/// A short day: leave the depot, make three stops (the second one right next
/// to the first) and come back.
pub fn demo_day(
    depot: Coordinate,
    start_time: DateTime<Utc>,
    dwell_secs: i64,
    seed: u64,
) -> Vec<PositionSample> {
    let mut track = TrackBuilder::new(depot, start_time, seed).jitter(4.0);
    track
        .dwell(dwell_secs + 30)
        .drive_by(450.0, 0.0, 30.0)
        .dwell(dwell_secs + 15)
        .drive_by(0.0, 90.0, 15.0)
        .dwell(dwell_secs + 15)
        .drive_by(300.0, 500.0, 35.0)
        .dwell(dwell_secs + 15)
        .drive_to(depot, 40.0)
        .dwell(dwell_secs + 30);
    track.build()
}

/// Reads a JSON array of position samples.
pub fn load_track(path: &Path) -> Result<Vec<PositionSample>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read track {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse track {}", path.display()))
}
