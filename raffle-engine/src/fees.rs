use crate::config::{FeeWidth, FEE_PERCENTAGE, POOL_PRECISION, PRIZE_POOL_PERCENTAGE};
use crate::error::{RaffleError, Result};
use crate::types::Balance;
use serde::{Deserialize, Serialize};

/// Split of a round's pot. `prize_pool + fee` may fall short of `total`
/// by the floor-division remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotSplit {
    pub total: Balance,
    pub prize_pool: Balance,
    pub fee: Balance,
}

impl PotSplit {
    pub fn of(total: Balance) -> Result<Self> {
        let prize_pool = total
            .checked_mul(PRIZE_POOL_PERCENTAGE)
            .ok_or(RaffleError::FeeOverflow)?
            / POOL_PRECISION;
        let fee = total
            .checked_mul(FEE_PERCENTAGE)
            .ok_or(RaffleError::FeeOverflow)?
            / POOL_PRECISION;

        Ok(Self {
            total,
            prize_pool,
            fee,
        })
    }

    pub fn dust(&self) -> Balance {
        self.total - self.prize_pool - self.fee
    }
}

/// Operator fees accrued across rounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeAccumulator {
    width: FeeWidth,
    total: Balance,
}

impl FeeAccumulator {
    pub fn new(width: FeeWidth) -> Self {
        Self { width, total: 0 }
    }

    pub fn width(&self) -> FeeWidth {
        self.width
    }

    pub fn total(&self) -> Balance {
        self.total
    }

    /// Add `fee` and return the new total.
    ///
    /// `Narrow64` truncates `fee` to 64 bits and wraps on overflow without
    /// signalling it, losing everything accrued so far.
    pub fn accrue(&mut self, fee: Balance) -> Result<Balance> {
        self.total = match self.width {
            FeeWidth::Narrow64 => (self.total as u64).wrapping_add(fee as u64) as Balance,
            FeeWidth::Wide128 => self
                .total
                .checked_add(fee)
                .ok_or(RaffleError::FeeOverflow)?,
        };
        Ok(self.total)
    }

    /// Reset to zero and return what was accrued.
    pub fn take(&mut self) -> Balance {
        std::mem::take(&mut self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_drops_remainder() {
        let split = PotSplit::of(7).unwrap();
        assert_eq!(split.prize_pool, 5);
        assert_eq!(split.fee, 1);
        assert_eq!(split.dust(), 1);

        let even = PotSplit::of(4_000).unwrap();
        assert_eq!(even.prize_pool + even.fee, even.total);
    }

    #[test]
    fn test_narrow_accumulator_wraps() {
        let mut fees = FeeAccumulator::new(FeeWidth::Narrow64);
        let first = fees.accrue(u64::MAX as Balance - 10).unwrap();
        let second = fees.accrue(20).unwrap();
        assert!(second < first);
        assert_eq!(second, 9);
    }

    #[test]
    fn test_wide_accumulator_does_not_wrap_past_u64() {
        let mut fees = FeeAccumulator::new(FeeWidth::Wide128);
        fees.accrue(u64::MAX as Balance).unwrap();
        let total = fees.accrue(u64::MAX as Balance).unwrap();
        assert_eq!(total, 2 * u64::MAX as Balance);
    }

    #[test]
    fn test_wide_accumulator_reverts_at_its_limit() {
        let mut fees = FeeAccumulator::new(FeeWidth::Wide128);
        fees.accrue(Balance::MAX).unwrap();
        assert_eq!(fees.accrue(1), Err(RaffleError::FeeOverflow));
        assert_eq!(fees.total(), Balance::MAX);
    }

    #[test]
    fn test_take_resets() {
        let mut fees = FeeAccumulator::new(FeeWidth::Wide128);
        fees.accrue(42).unwrap();
        assert_eq!(fees.take(), 42);
        assert_eq!(fees.total(), 0);
    }
}
