//! Monthly tier recalculation and creator fee profiles.

use crate::error::EngineError;
use crate::fees::{CreatorTierProfile, FeeTier, TierSchedule};
use crate::oplog::{LogEvent, OperationLog};
use crate::processors::failover::{FailoverOperation, FailoverQueue};
use crate::store::LedgerStore;
use fanpay_sdk::objects::FeeProfileResponse;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Earnings window for tier assignment.
pub const TRAILING_WINDOW: Duration = Duration::days(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalculationSummary {
    pub evaluated: u32,
    pub updated: u32,
    pub skipped_elite: u32,
    pub failed: u32,
}

impl std::fmt::Display for RecalculationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "evaluated {}, updated {}, elite {}, failed {}",
            self.evaluated, self.updated, self.skipped_elite, self.failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeProfile {
    pub creator_id: Uuid,
    pub elite_founding: bool,
    pub trailing_month_earnings: i64,
    pub effective_tier: FeeTier,
    pub assigned_tier: Option<FeeTier>,
}

impl From<FeeProfile> for FeeProfileResponse {
    fn from(p: FeeProfile) -> Self {
        Self {
            creator_id: p.creator_id,
            elite_founding: p.elite_founding,
            trailing_month_earnings: p.trailing_month_earnings,
            effective_tier: p.effective_tier.into(),
            assigned_tier: p.assigned_tier.map(Into::into),
        }
    }
}

pub struct TierRecalculator {
    store: Arc<dyn LedgerStore>,
    tiers: TierSchedule,
    failover: Arc<FailoverQueue>,
    log: Arc<OperationLog>,
}

impl TierRecalculator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        tiers: TierSchedule,
        failover: Arc<FailoverQueue>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            store,
            tiers,
            failover,
            log,
        }
    }

    async fn trailing_earnings(&self, creator_id: Uuid) -> Result<i64, EngineError> {
        let since = OffsetDateTime::now_utc() - TRAILING_WINDOW;
        Ok(self.store.sum_creator_gross_since(creator_id, since).await?)
    }

    /// Recompute and persist one creator's tier. Returns `None` for Elite
    /// Founding creators, whose tier is never recalculated.
    pub async fn recalculate_creator(
        &self,
        creator_id: Uuid,
    ) -> Result<Option<FeeTier>, EngineError> {
        let account = self
            .store
            .get_creator(creator_id)
            .await?
            .ok_or(EngineError::AccountNotFound { creator_id })?;
        if account.elite_founding {
            return Ok(None);
        }
        let earnings = self.trailing_earnings(creator_id).await?;
        let tier = self.tiers.resolve_monthly_tier(earnings);
        if account.assigned_tier != Some(tier) {
            self.store
                .set_assigned_tier(creator_id, tier, OffsetDateTime::now_utc())
                .await?;
            self.log.record(
                LogEvent::info("tier.recalculate", "creator tier changed")
                    .creator(creator_id)
                    .meta("trailing_earnings", earnings)
                    .meta("platform_percent", tier.platform_percent)
                    .meta("creator_percent", tier.creator_percent),
            );
        }
        Ok(Some(tier))
    }

    /// Recompute every non-Elite creator. One creator failing never aborts
    /// the run; transient failures are captured for retry.
    #[tracing::instrument(skip_all)]
    pub async fn recalculate_all(&self) -> Result<RecalculationSummary, EngineError> {
        let creators = self.store.list_creators().await?;
        let mut summary = RecalculationSummary::default();
        for account in creators {
            summary.evaluated += 1;
            if account.elite_founding {
                summary.skipped_elite += 1;
                continue;
            }
            let previous = account.assigned_tier;
            match self.recalculate_creator(account.creator_id).await {
                Ok(Some(tier)) if previous != Some(tier) => summary.updated += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    self.log.record(
                        LogEvent::error("tier.recalculate", "tier recalculation failed")
                            .creator(account.creator_id)
                            .meta("error", e.detail()),
                    );
                    if e.is_transient() {
                        let operation = FailoverOperation::TierRecalculation {
                            creator_id: account.creator_id,
                        };
                        // A refused capture is already logged as CRITICAL.
                        let _ = self.failover.record(&operation, &e);
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Current fee position of a creator.
    pub async fn fee_profile(&self, creator_id: Uuid) -> Result<FeeProfile, EngineError> {
        let account = self.store.get_creator(creator_id).await?;
        let elite_founding = account.as_ref().is_some_and(|a| a.elite_founding);
        let trailing_month_earnings = self.trailing_earnings(creator_id).await?;
        let effective_tier = self.tiers.resolve_effective_tier(&CreatorTierProfile {
            elite_founding,
            monthly_earnings: trailing_month_earnings,
        });
        Ok(FeeProfile {
            creator_id,
            elite_founding,
            trailing_month_earnings,
            effective_tier,
            assigned_tier: account.and_then(|a| a.assigned_tier),
        })
    }
}
