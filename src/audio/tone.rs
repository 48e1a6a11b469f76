use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Samples over which the tone fades in and out, so it doesn't click.
const RAMP_SAMPLES: usize = 441;

/// Short mono sine beep.
pub struct Tone {
    frequency: f32,
    volume: f32,
    total_samples: usize,
    num_sample: usize,
}

impl Tone {
    pub fn new(frequency: f32, duration: Duration, volume: f32) -> Self {
        let total_samples = (duration.as_secs_f32() * SAMPLE_RATE as f32) as usize;
        Self {
            frequency,
            volume: volume.clamp(0.0, 1.0),
            total_samples,
            num_sample: 0,
        }
    }

    fn envelope(&self) -> f32 {
        let from_start = self.num_sample;
        let to_end = self.total_samples - self.num_sample;
        let edge = from_start.min(to_end).min(RAMP_SAMPLES);
        edge as f32 / RAMP_SAMPLES as f32
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let sample = (2.0 * PI * self.frequency * t).sin() * self.volume * self.envelope();
        self.num_sample += 1;
        Some(sample)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_is_finite_and_bounded() {
        let tone = Tone::new(880.0, Duration::from_millis(150), 0.3);
        let samples: Vec<f32> = tone.collect();
        assert!((6614..=6615).contains(&samples.len()));
        assert!(samples.iter().all(|s| s.abs() <= 0.3 + f32::EPSILON));
        assert_eq!(samples[0], 0.0);
    }
}
