/// Abstraction over the monotonic counter that drives the playback clock.
/// Implementations: SystemTimeProvider (production), MockTimeProvider (testing).
pub trait TimeProvider {
    /// Current counter value in microseconds from an arbitrary epoch.
    fn now_us(&self) -> i64;

    /// Seconds elapsed since a counter value previously read from this
    /// provider. Negative if the reference lies in the future, as it does
    /// after a seek past the current position.
    fn elapsed_secs(&self, since_us: i64) -> f64 {
        (self.now_us() - since_us) as f64 / 1_000_000.0
    }
}

/// Monotonic system counter backed by std::time::Instant.
pub struct SystemTimeProvider {
    origin: std::time::Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }
}

/// Manually stepped counter for deterministic clock tests.
pub struct MockTimeProvider {
    current_us: std::cell::Cell<i64>,
}

impl MockTimeProvider {
    pub fn new() -> Self {
        Self {
            current_us: std::cell::Cell::new(0),
        }
    }

    pub fn set_time(&self, us: i64) {
        self.current_us.set(us);
    }

    pub fn advance(&self, delta_us: i64) {
        self.current_us.set(self.current_us.get() + delta_us);
    }

    /// Advance by a duration expressed in seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance((secs * 1_000_000.0).round() as i64);
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_us(&self) -> i64 {
        self.current_us.get()
    }
}
