//! Bonus multiplier policy applied when converting USD into Trading Credits.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multiplier for one purchase-amount bracket: `[min, max)`.
///
/// `max = None` marks the open-ended final tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMultiplier {
    pub min: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,
    pub multiplier: Decimal,
}

impl TierMultiplier {
    pub fn new(min: Decimal, max: Option<Decimal>, multiplier: Decimal) -> Self {
        TierMultiplier {
            min,
            max,
            multiplier,
        }
    }

    /// `min` inclusive, `max` exclusive.
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && self.max.map_or(true, |max| amount < max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BonusInfoError {
    #[error("tier table is empty")]
    NoTiers,
    #[error("first tier must start at 0, starts at {0}")]
    FirstTierNotZero(Decimal),
    #[error("tier {index} is empty or inverted")]
    EmptyTier { index: usize },
    #[error("tier {index} starts at {found}, expected {expected}")]
    Discontinuous {
        index: usize,
        expected: Decimal,
        found: Decimal,
    },
    #[error("only the final tier may be unbounded (tier {index})")]
    UnboundedBeforeEnd { index: usize },
    #[error("final tier must be unbounded")]
    BoundedFinalTier,
    #[error("negative multiplier: {0}")]
    NegativeMultiplier(Decimal),
}

/// Bonus policy. Loaded at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusInfo {
    pub base_multiplier: Decimal,
    pub tier_multipliers: Vec<TierMultiplier>,
    /// Added once, on a user's first completed purchase.
    pub first_time_bonus: Decimal,
}

impl Default for BonusInfo {
    fn default() -> Self {
        let d = |s: &str| Decimal::from_str_canonical(s).unwrap_or_default();
        BonusInfo {
            base_multiplier: Decimal::one(),
            tier_multipliers: vec![
                TierMultiplier::new(Decimal::zero(), Some(d("25")), Decimal::one()),
                TierMultiplier::new(d("25"), Some(d("100")), d("1.1")),
                TierMultiplier::new(d("100"), None, d("1.25")),
            ],
            first_time_bonus: d("0.5"),
        }
    }
}

impl BonusInfo {
    /// A policy with a single `[0, ∞)` tier.
    pub fn flat(base_multiplier: Decimal, first_time_bonus: Decimal) -> Self {
        BonusInfo {
            base_multiplier,
            tier_multipliers: vec![TierMultiplier::new(Decimal::zero(), None, Decimal::one())],
            first_time_bonus,
        }
    }

    /// Check that tiers are contiguous, non-overlapping and cover `[0, ∞)`.
    pub fn validate(&self) -> Result<(), BonusInfoError> {
        for m in [self.base_multiplier, self.first_time_bonus] {
            if m.is_negative() {
                return Err(BonusInfoError::NegativeMultiplier(m));
            }
        }

        let first = self.tier_multipliers.first().ok_or(BonusInfoError::NoTiers)?;
        if !first.min.is_zero() {
            return Err(BonusInfoError::FirstTierNotZero(first.min));
        }

        let last_index = self.tier_multipliers.len() - 1;
        let mut expected_min = Decimal::zero();
        for (index, tier) in self.tier_multipliers.iter().enumerate() {
            if tier.multiplier.is_negative() {
                return Err(BonusInfoError::NegativeMultiplier(tier.multiplier));
            }
            if tier.min != expected_min {
                return Err(BonusInfoError::Discontinuous {
                    index,
                    expected: expected_min,
                    found: tier.min,
                });
            }
            match tier.max {
                Some(max) if max <= tier.min => return Err(BonusInfoError::EmptyTier { index }),
                Some(_) if index == last_index => return Err(BonusInfoError::BoundedFinalTier),
                Some(max) => expected_min = max,
                None if index != last_index => {
                    return Err(BonusInfoError::UnboundedBeforeEnd { index })
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Tier whose bracket contains `amount`.
    pub fn tier_for(&self, amount: Decimal) -> Option<&TierMultiplier> {
        self.tier_multipliers.iter().find(|t| t.contains(amount))
    }

    /// Combined multiplier: `base * tier (+ first_time_bonus)`.
    pub fn multiplier_for(&self, amount: Decimal, first_time: bool) -> Option<Decimal> {
        let tier = self.tier_for(amount)?;
        let multiplier = self.base_multiplier.checked_mul(tier.multiplier)?;
        if first_time {
            multiplier.checked_add(self.first_time_bonus)
        } else {
            Some(multiplier)
        }
    }
}

/// Bonus percentage reported on a purchase: `(multiplier - 1) * 100`.
pub fn bonus_percentage(multiplier: Decimal) -> Decimal {
    (multiplier - Decimal::one()) * Decimal::hundred()
}
