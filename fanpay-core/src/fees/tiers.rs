use super::FeeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Minimum trailing-month earnings, inclusive.
    pub threshold: i64,
    pub platform_percent: u8,
    pub creator_percent: u8,
}

impl FeeTier {
    pub const fn new(threshold: i64, platform_percent: u8, creator_percent: u8) -> Self {
        Self {
            threshold,
            platform_percent,
            creator_percent,
        }
    }
}

impl From<FeeTier> for fanpay_sdk::objects::TierResponse {
    fn from(tier: FeeTier) -> Self {
        Self {
            threshold: tier.threshold,
            platform_percent: tier.platform_percent,
            creator_percent: tier.creator_percent,
        }
    }
}

const BASE_TIER: FeeTier = FeeTier::new(0, 20, 80);

/// Tiers ordered by descending threshold, ending at a zero threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeeTier>", into = "Vec<FeeTier>")]
pub struct TierSchedule {
    tiers: Vec<FeeTier>,
}

impl TierSchedule {
    pub fn new(tiers: Vec<FeeTier>) -> Result<Self, FeeError> {
        if tiers.is_empty() {
            return Err(FeeError::InvalidTiers("no tiers".to_string()));
        }
        for pair in tiers.windows(2) {
            if pair[0].threshold <= pair[1].threshold {
                return Err(FeeError::InvalidTiers(format!(
                    "thresholds must strictly descend ({} then {})",
                    pair[0].threshold, pair[1].threshold
                )));
            }
        }
        if tiers.last().map(|t| t.threshold) != Some(0) {
            return Err(FeeError::InvalidTiers(
                "the last tier must have threshold 0".to_string(),
            ));
        }
        for tier in &tiers {
            if tier.platform_percent as u16 + tier.creator_percent as u16 != 100 {
                return Err(FeeError::InvalidRatio {
                    creator_percent: tier.creator_percent,
                    platform_percent: tier.platform_percent,
                });
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    /// Lowest platform fee on offer.
    pub fn top_tier(&self) -> FeeTier {
        self.tiers.first().copied().unwrap_or(BASE_TIER)
    }

    fn base_tier(&self) -> FeeTier {
        self.tiers.last().copied().unwrap_or(BASE_TIER)
    }

    /// First tier whose threshold the earnings reach.
    pub fn resolve_monthly_tier(&self, monthly_earnings: i64) -> FeeTier {
        self.tiers
            .iter()
            .find(|tier| monthly_earnings >= tier.threshold)
            .copied()
            .unwrap_or_else(|| self.base_tier())
    }

    /// Elite Founding creators always get the top tier.
    pub fn resolve_effective_tier(&self, profile: &CreatorTierProfile) -> FeeTier {
        if profile.elite_founding {
            self.top_tier()
        } else {
            self.resolve_monthly_tier(profile.monthly_earnings)
        }
    }
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                FeeTier::new(5_000_000, 10, 90),
                FeeTier::new(2_500_000, 12, 88),
                FeeTier::new(1_000_000, 15, 85),
                FeeTier::new(500_000, 17, 83),
                BASE_TIER,
            ],
        }
    }
}

impl TryFrom<Vec<FeeTier>> for TierSchedule {
    type Error = FeeError;

    fn try_from(tiers: Vec<FeeTier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<TierSchedule> for Vec<FeeTier> {
    fn from(schedule: TierSchedule) -> Self {
        schedule.tiers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatorTierProfile {
    pub elite_founding: bool,
    pub monthly_earnings: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_earner_gets_top_tier() {
        let tier = TierSchedule::default().resolve_monthly_tier(6_000_000);
        assert_eq!(tier.platform_percent, 10);
        assert_eq!(tier.creator_percent, 90);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let schedule = TierSchedule::default();
        assert_eq!(schedule.resolve_monthly_tier(2_500_000).platform_percent, 12);
        assert_eq!(schedule.resolve_monthly_tier(2_499_999).platform_percent, 15);
        assert_eq!(schedule.resolve_monthly_tier(500_000).platform_percent, 17);
        assert_eq!(schedule.resolve_monthly_tier(0).platform_percent, 20);
    }

    #[test]
    fn negative_earnings_fall_to_base_tier() {
        let tier = TierSchedule::default().resolve_monthly_tier(-250);
        assert_eq!(tier, BASE_TIER);
    }

    #[test]
    fn elite_founding_overrides_earnings() {
        let tier = TierSchedule::default().resolve_effective_tier(&CreatorTierProfile {
            elite_founding: true,
            monthly_earnings: 100,
        });
        assert_eq!(tier.platform_percent, 10);
        assert_eq!(tier.creator_percent, 90);
    }

    #[test]
    fn non_elite_uses_monthly_tier() {
        let tier = TierSchedule::default().resolve_effective_tier(&CreatorTierProfile {
            elite_founding: false,
            monthly_earnings: 1_200_000,
        });
        assert_eq!(tier.platform_percent, 15);
    }

    #[test]
    fn rejects_unordered_tiers() {
        let err = TierSchedule::new(vec![
            FeeTier::new(100, 15, 85),
            FeeTier::new(200, 12, 88),
            FeeTier::new(0, 20, 80),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_schedule_without_zero_threshold() {
        assert!(TierSchedule::new(vec![FeeTier::new(100, 15, 85)]).is_err());
    }

    #[test]
    fn deserializes_from_list() {
        let schedule: TierSchedule = serde_json::from_str(
            r#"[{"threshold":1000,"platform_percent":15,"creator_percent":85},
                {"threshold":0,"platform_percent":20,"creator_percent":80}]"#,
        )
        .unwrap();
        assert_eq!(schedule.top_tier().threshold, 1000);
    }
}
