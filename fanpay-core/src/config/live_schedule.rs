//! Scheduler intervals that can change while the engine runs.

use super::{ConfigError, ScheduleConfig};
use std::sync::Arc;
use tokio::sync::watch;

/// The current [`ScheduleConfig`], shared between the engine and the
/// scheduler's tick loops. Only validated schedules are published.
#[derive(Debug, Clone)]
pub struct LiveSchedule {
    tx: Arc<watch::Sender<ScheduleConfig>>,
}

impl LiveSchedule {
    pub fn new(initial: ScheduleConfig) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(initial)),
        }
    }

    pub fn current(&self) -> ScheduleConfig {
        self.tx.borrow().clone()
    }

    /// Publish `next` to every subscriber. Returns whether any interval
    /// changed; an identical schedule wakes nobody.
    pub fn replace(&self, next: ScheduleConfig) -> Result<bool, ConfigError> {
        next.validate()?;
        Ok(self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        }))
    }

    /// A receiver that sees the current schedule as already observed.
    pub fn subscribe(&self) -> watch::Receiver<ScheduleConfig> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_wakes_subscribers_only_on_change() {
        let live = LiveSchedule::new(ScheduleConfig::default());
        let mut rx = live.subscribe();

        assert!(!live.replace(ScheduleConfig::default()).unwrap());
        assert!(!rx.has_changed().unwrap());

        let faster = ScheduleConfig {
            failover_sweep_secs: 5,
            ..ScheduleConfig::default()
        };
        assert!(live.replace(faster.clone()).unwrap());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), faster);
        assert_eq!(live.current(), faster);
    }

    #[test]
    fn invalid_schedule_is_never_published() {
        let live = LiveSchedule::new(ScheduleConfig::default());
        let broken = ScheduleConfig {
            batch_payouts_secs: 0,
            ..ScheduleConfig::default()
        };
        assert!(live.replace(broken).is_err());
        assert_eq!(live.current(), ScheduleConfig::default());
    }

    #[test]
    fn publishing_without_subscribers_still_updates() {
        let live = LiveSchedule::new(ScheduleConfig::default());
        let slower = ScheduleConfig {
            reconciliation_secs: 14 * 24 * 3600,
            ..ScheduleConfig::default()
        };
        assert!(live.replace(slower.clone()).unwrap());
        assert_eq!(live.current(), slower);
    }
}
