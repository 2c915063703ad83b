use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Longest a canceled wait keeps sleeping
const WAKE_INTERVAL: Duration = Duration::from_millis(20);

/// Lets the Ctrl+C handler stop the card polling loops
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, returning early once canceled. Returns whether the token is canceled.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;

        while !self.is_canceled() {
            let now = Instant::now();

            if now >= deadline {
                break;
            }

            std::thread::sleep(WAKE_INTERVAL.min(deadline - now));
        }

        self.is_canceled()
    }
}
