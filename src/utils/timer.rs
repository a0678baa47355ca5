//! Run timing
//!
//! Reads the tokio clock, so paused-time tests see virtual durations.

use std::time::Duration;
use tokio::time::Instant;

/// Measures one labelled span and logs it when stopped
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{} took {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer_measures_until_stop() {
        // outside a runtime the tokio clock is the system clock
        let timer = Timer::start("pool run");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));

        let total = timer.stop();
        assert!(total >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_follows_paused_clock() {
        let timer = Timer::start("paused");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(timer.stop().as_secs(), 30);
    }
}
