use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

/// Fire-and-forget feedback. Implementations swallow their own failures.
pub trait Notifier: Send + Sync {
    fn notify_success(&self);

    fn notify_error(&self);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_success(&self) {
        debug!("feedback: success");
    }

    fn notify_error(&self) {
        debug!("feedback: error");
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    successes: AtomicUsize,
    errors: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}
