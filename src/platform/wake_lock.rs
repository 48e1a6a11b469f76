use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

#[derive(Debug, PartialEq, Eq)]
pub struct WakeLockToken(pub u64);

/// Keeps the display awake. Platforms without support return `None` from
/// `acquire`; that is not an error.
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Option<WakeLockToken>;

    fn release(&self, token: WakeLockToken);
}

/// Held wake-lock, released exactly once: explicitly or on drop.
pub struct WakeLockGuard {
    lock: Arc<dyn WakeLock>,
    token: Option<WakeLockToken>,
}

impl WakeLockGuard {
    pub fn acquire(lock: Arc<dyn WakeLock>) -> Option<Self> {
        let token = lock.acquire()?;
        Some(Self {
            lock,
            token: Some(token),
        })
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(token) = self.token.take() {
            self.lock.release(token);
        }
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Wake-lock that only counts calls.
pub struct CountingWakeLock {
    supported: bool,
    next_token: AtomicU64,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingWakeLock {
    pub fn new() -> Self {
        Self {
            supported: true,
            next_token: AtomicU64::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_held(&self) -> bool {
        self.acquired() > self.released()
    }
}

impl Default for CountingWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for CountingWakeLock {
    fn acquire(&self) -> Option<WakeLockToken> {
        if !self.supported {
            return None;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Some(WakeLockToken(self.next_token.fetch_add(1, Ordering::SeqCst)))
    }

    fn release(&self, _token: WakeLockToken) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
