//! Wall-clock source for session expiry.

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::SystemTime`].
///
/// Not usable on `wasm32-unknown-unknown`; browser hosts supply their own clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| {
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
            })
    }
}

/// [`Clock`] frozen at a settable instant.
#[derive(Debug, Default)]
pub struct FixedClock(std::sync::atomic::AtomicU64);

impl FixedClock {
    /// Creates a clock reading `now_millis`.
    #[must_use]
    pub const fn new(now_millis: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(now_millis))
    }

    /// Moves the clock to `now_millis`.
    pub fn set(&self, now_millis: u64) {
        self.0.store(now_millis, std::sync::atomic::Ordering::SeqCst);
    }

    /// Moves the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
