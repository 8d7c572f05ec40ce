//! Engine tunables.
//!
//! These types hold the validated runtime configuration shared by the engine
//! and the server. File loading and CLI overrides live in the server crate.

mod live_schedule;

pub use live_schedule::LiveSchedule;

use crate::fees::{FeeError, FeeSchedule, TierSchedule};
use fanpay_sdk::objects::ScheduledTask;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Automatic attempts per failover record before it is exhausted.
pub const MAX_RETRIES: u32 = 5;

/// Longest retention for resolved failover records.
pub const MAX_RETENTION_DAYS: u32 = 3_650;

/// Longest scheduler tick period, one leap year.
pub const MAX_PERIOD_SECS: u64 = 366 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Fees(#[from] FeeError),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("currency must be a three-letter ISO 4217 code, got {0:?}")]
    Currency(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    pub capacity: usize,
    /// Days a resolved record is kept before collection.
    pub retention_days: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            retention_days: 30,
        }
    }
}

impl FailoverConfig {
    pub fn retention(&self) -> time::Duration {
        time::Duration::days(self.retention_days as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub capacity: usize,
    /// Upper bound on entries returned by one query.
    pub query_cap: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            query_cap: 1_000,
        }
    }
}

/// Call time boxes, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub gateway_ms: u64,
    pub store_ms: u64,
    /// Per-creator step inside a batch run.
    pub batch_step_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            gateway_ms: 10_000,
            store_ms: 5_000,
            batch_step_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn gateway(&self) -> Duration {
        Duration::from_millis(self.gateway_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn batch_step(&self) -> Duration {
        Duration::from_millis(self.batch_step_ms)
    }
}

/// Scheduler tick periods, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub tier_recalculation_secs: u64,
    pub batch_payouts_secs: u64,
    pub reconciliation_secs: u64,
    pub failover_sweep_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tier_recalculation_secs: 30 * 24 * 3600,
            batch_payouts_secs: 24 * 3600,
            reconciliation_secs: 7 * 24 * 3600,
            failover_sweep_secs: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn period(&self, task: ScheduledTask) -> Duration {
        let secs = match task {
            ScheduledTask::MonthlyTierRecalculation => self.tier_recalculation_secs,
            ScheduledTask::DailyBatchPayouts => self.batch_payouts_secs,
            ScheduledTask::WeeklyReconciliation => self.reconciliation_secs,
            ScheduledTask::FailoverSweep => self.failover_sweep_secs,
        };
        Duration::from_secs(secs.clamp(1, MAX_PERIOD_SECS))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("schedule.tier_recalculation_secs", self.tier_recalculation_secs),
            ("schedule.batch_payouts_secs", self.batch_payouts_secs),
            ("schedule.reconciliation_secs", self.reconciliation_secs),
            ("schedule.failover_sweep_secs", self.failover_sweep_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
            if value > MAX_PERIOD_SECS {
                return Err(ConfigError::TooLarge {
                    field,
                    max: MAX_PERIOD_SECS,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowercase ISO 4217 code for all money movement.
    pub currency: String,
    pub fees: FeeSchedule,
    pub tiers: TierSchedule,
    pub failover: FailoverConfig,
    pub log: LogConfig,
    pub timeouts: TimeoutConfig,
    pub schedule: ScheduleConfig,
    /// Creators below this available balance are skipped by batch payouts.
    pub batch_min_amount: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            fees: FeeSchedule::default(),
            tiers: TierSchedule::default(),
            failover: FailoverConfig::default(),
            log: LogConfig::default(),
            timeouts: TimeoutConfig::default(),
            schedule: ScheduleConfig::default(),
            batch_min_amount: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ConfigError::Currency(self.currency.clone()));
        }
        self.fees.validate()?;
        for (field, value) in [
            ("failover.capacity", self.failover.capacity as u64),
            ("log.capacity", self.log.capacity as u64),
            ("log.query_cap", self.log.query_cap as u64),
            ("timeouts.gateway_ms", self.timeouts.gateway_ms),
            ("timeouts.store_ms", self.timeouts.store_ms),
            ("timeouts.batch_step_ms", self.timeouts.batch_step_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.failover.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::TooLarge {
                field: "failover.retention_days",
                max: MAX_RETENTION_DAYS as u64,
            });
        }
        if self.batch_min_amount <= 0 {
            return Err(ConfigError::Zero {
                field: "batch_min_amount",
            });
        }
        self.schedule.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::SplitRatio;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeouts.gateway(), Duration::from_secs(10));
        assert_eq!(config.timeouts.store(), Duration::from_secs(5));
        assert_eq!(
            config.schedule.period(ScheduledTask::FailoverSweep),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn unbalanced_fee_pair_is_rejected() {
        let mut config = EngineConfig::default();
        config.fees.tip = SplitRatio::new(80, 25);
        assert!(matches!(config.validate(), Err(ConfigError::Fees(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = EngineConfig::default();
        config.timeouts.store_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "timeouts.store_ms"
            })
        ));
    }

    #[test]
    fn unbounded_retention_is_rejected() {
        let mut config = EngineConfig::default();
        config.failover.retention_days = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "failover.retention_days",
                ..
            })
        ));
        config.failover.retention_days = MAX_RETENTION_DAYS;
        config.validate().unwrap();
    }

    #[test]
    fn overlong_schedule_period_is_rejected() {
        let mut config = EngineConfig::default();
        config.schedule.failover_sweep_secs = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "schedule.failover_sweep_secs",
                ..
            })
        ));
        config.schedule.failover_sweep_secs = MAX_PERIOD_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn uppercase_currency_is_rejected() {
        let config = EngineConfig {
            currency: "USD".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Currency(_))));
    }
}
