use std::time::Duration;
use tokio::time::Instant;

/// A single-shot deadline owned by the scheduler loop.
///
/// Starting an already running timer keeps the earlier deadline, so many
/// triggers within one loop iteration collapse into a single firing.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OneShotTimer {
    deadline: Option<Instant>,
}

impl OneShotTimer {
    /// Arm the timer to fire after `delay`, unless it is already armed
    pub(crate) fn start(&mut self, delay: Duration) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + delay);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.deadline = None;
    }

    pub(crate) const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub(crate) const fn is_active(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Sleep until `deadline`, or forever if there is none
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_keeps_earlier_deadline() {
        let mut timer = OneShotTimer::default();
        assert!(!timer.is_active());

        timer.start(Duration::from_millis(100));
        let first = timer.deadline();
        timer.start(Duration::ZERO);
        assert_eq!(timer.deadline(), first);

        timer.clear();
        assert!(!timer.is_active());
        timer.start(Duration::ZERO);
        assert_eq!(timer.deadline(), Some(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let start = Instant::now();
        sleep_until(Some(start + Duration::from_millis(250))).await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
