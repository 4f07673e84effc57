use std::sync::Mutex;
use std::time::Duration;

/// How often a paused session re-checks its flags.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timed suspension between characters. Every suspension is a point where a
/// session can observe pause and cancellation.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper: blocks the session's worker thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper that returns immediately and remembers every requested duration.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(duration);
        }
    }
}

/// Adapts a closure, letting tests act (pause, stop, mutate the page) at
/// each suspension point.
pub struct FnSleeper<F>(pub F);

impl<F> Sleeper for FnSleeper<F>
where
    F: Fn(Duration) + Send + Sync + 'static,
{
    fn sleep(&self, duration: Duration) {
        (self.0)(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn recording_sleeper_returns_immediately() {
        let sleeper = RecordingSleeper::new();
        let started = Instant::now();
        sleeper.sleep(Duration::from_secs(60));
        sleeper.sleep(Duration::from_millis(5));

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(60), Duration::from_millis(5)]
        );
    }

    #[test]
    fn thread_sleeper_blocks() {
        let started = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(5));
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn fn_sleeper_invokes_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sleeper = FnSleeper(move |_: Duration| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        sleeper.sleep(Duration::ZERO);
        sleeper.sleep(Duration::ZERO);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
