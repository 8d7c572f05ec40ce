//! Revenue split rules.
//!
//! Amounts are integer minor currency units. The creator share is
//! `floor(amount * creator_percent / 100)` and the platform receives the
//! remainder, so the two parts always sum back to the amount.

pub mod tiers;

pub use tiers::{CreatorTierProfile, FeeTier, TierSchedule};

use crate::entities::Category;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("amount must not be negative, got {0}")]
    NegativeAmount(i64),
    #[error("category {0} does not carry a revenue split")]
    UnsupportedCategory(Category),
    #[error("split {creator_percent}/{platform_percent} does not sum to 100")]
    InvalidRatio {
        creator_percent: u8,
        platform_percent: u8,
    },
    #[error("tier schedule is invalid: {0}")]
    InvalidTiers(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRatio {
    pub creator_percent: u8,
    pub platform_percent: u8,
}

impl SplitRatio {
    pub const fn new(creator_percent: u8, platform_percent: u8) -> Self {
        Self {
            creator_percent,
            platform_percent,
        }
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        if self.creator_percent as u16 + self.platform_percent as u16 != 100 {
            return Err(FeeError::InvalidRatio {
                creator_percent: self.creator_percent,
                platform_percent: self.platform_percent,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub creator_earnings: i64,
    pub platform_fee: i64,
}

/// Divide `amount` so the creator gets the truncated percentage.
pub fn split_amount(amount: i64, creator_percent: u8) -> Result<Split, FeeError> {
    if amount < 0 {
        return Err(FeeError::NegativeAmount(amount));
    }
    let creator = (amount as i128 * creator_percent.min(100) as i128) / 100;
    let creator_earnings = creator as i64;
    Ok(Split {
        creator_earnings,
        platform_fee: amount - creator_earnings,
    })
}

/// Per-category revenue splits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub subscription: SplitRatio,
    pub pay_per_view: SplitRatio,
    pub tip: SplitRatio,
    pub merchandise: SplitRatio,
    pub ephemeral_content: SplitRatio,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            subscription: SplitRatio::new(80, 20),
            pay_per_view: SplitRatio::new(80, 20),
            tip: SplitRatio::new(80, 20),
            merchandise: SplitRatio::new(90, 10),
            ephemeral_content: SplitRatio::new(80, 20),
        }
    }
}

impl FeeSchedule {
    pub fn ratio_for(&self, category: Category) -> Result<SplitRatio, FeeError> {
        match category {
            Category::Subscription => Ok(self.subscription),
            Category::PayPerView => Ok(self.pay_per_view),
            Category::Tip => Ok(self.tip),
            Category::Merchandise => Ok(self.merchandise),
            Category::EphemeralContent => Ok(self.ephemeral_content),
            Category::Payout => Err(FeeError::UnsupportedCategory(category)),
        }
    }

    pub fn resolve_category_split(
        &self,
        amount: i64,
        category: Category,
    ) -> Result<Split, FeeError> {
        let ratio = self.ratio_for(category)?;
        split_amount(amount, ratio.creator_percent)
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        for ratio in [
            self.subscription,
            self.pay_per_view,
            self.tip,
            self.merchandise,
            self.ephemeral_content,
        ] {
            ratio.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_splits_eighty_twenty() {
        let split = FeeSchedule::default()
            .resolve_category_split(10_000, Category::Subscription)
            .unwrap();
        assert_eq!(split.creator_earnings, 8_000);
        assert_eq!(split.platform_fee, 2_000);
    }

    #[test]
    fn merchandise_splits_ninety_ten() {
        let split = FeeSchedule::default()
            .resolve_category_split(2_500, Category::Merchandise)
            .unwrap();
        assert_eq!(split.creator_earnings, 2_250);
        assert_eq!(split.platform_fee, 250);
    }

    #[test]
    fn odd_amounts_round_toward_the_platform() {
        let split = split_amount(999, 80).unwrap();
        assert_eq!(split.creator_earnings, 799);
        assert_eq!(split.platform_fee, 200);
        assert_eq!(split.creator_earnings + split.platform_fee, 999);
    }

    #[test]
    fn parts_always_sum_to_amount() {
        for amount in [0, 1, 7, 333, 10_001, i64::MAX] {
            for pct in [0u8, 1, 33, 80, 88, 90, 100] {
                let split = split_amount(amount, pct).unwrap();
                assert_eq!(split.creator_earnings + split.platform_fee, amount);
                assert!(split.platform_fee >= 0 && split.platform_fee <= amount);
            }
        }
    }

    #[test]
    fn payout_category_has_no_split() {
        let err = FeeSchedule::default()
            .resolve_category_split(100, Category::Payout)
            .unwrap_err();
        assert_eq!(err, FeeError::UnsupportedCategory(Category::Payout));
    }

    #[test]
    fn negative_amount_rejected() {
        assert_eq!(split_amount(-1, 80), Err(FeeError::NegativeAmount(-1)));
    }

    #[test]
    fn schedule_validation_catches_bad_ratio() {
        let schedule = FeeSchedule {
            tip: SplitRatio::new(85, 20),
            ..FeeSchedule::default()
        };
        assert!(schedule.validate().is_err());
        assert!(FeeSchedule::default().validate().is_ok());
    }
}
