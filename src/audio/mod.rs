//! Audible feedback through the default output device.

pub mod tone;

use log::warn;
use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use crate::platform::Notifier;
use tone::Tone;

#[derive(Debug, Clone, Copy)]
enum Cue {
    Success,
    Error,
}

impl Cue {
    fn tone(self) -> Tone {
        match self {
            Cue::Success => Tone::new(880.0, Duration::from_millis(150), 0.3),
            Cue::Error => Tone::new(330.0, Duration::from_millis(400), 0.5),
        }
    }
}

/// Plays success/error beeps on a dedicated thread that owns the non-`Send`
/// output stream. Devices without audio output stay silent.
pub struct ToneNotifier {
    tx: Mutex<Option<Sender<Cue>>>,
}

impl ToneNotifier {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<Cue>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Cue>();
        thread::Builder::new()
            .name("tone-notifier".to_string())
            .spawn(move || {
                let (_stream, sink) = match OutputStream::try_default()
                    .map_err(|e| e.to_string())
                    .and_then(|(stream, handle)| {
                        Sink::try_new(&handle)
                            .map(|sink| (stream, sink))
                            .map_err(|e| e.to_string())
                    }) {
                    Ok(output) => output,
                    Err(err) => {
                        warn!("Audio output unavailable, tones disabled: {err}");
                        return;
                    }
                };

                while let Ok(cue) = rx.recv() {
                    sink.append(cue.tone());
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn play(&self, cue: Cue) {
        // Once the thread has exited every send fails; that is fine.
        if let Ok(tx) = self.ensure_thread() {
            let _ = tx.send(cue);
        }
    }
}

impl Default for ToneNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ToneNotifier {
    fn notify_success(&self) {
        self.play(Cue::Success);
    }

    fn notify_error(&self) {
        self.play(Cue::Error);
    }
}
