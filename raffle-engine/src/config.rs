use crate::error::{RaffleError, Result};
use crate::types::{Address, Balance};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Minimum number of active players before a winner can be drawn.
pub const MIN_PLAYERS: usize = 4;
pub const PRIZE_POOL_PERCENTAGE: Balance = 80;
pub const FEE_PERCENTAGE: Balance = 20;
pub const POOL_PRECISION: Balance = 100;

pub const DEFAULT_ORACLE_LABEL: &str = "randomness-oracle";

/// Preset bundles of policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineProfile {
    /// Every audit finding reproduced as shipped.
    Audited,
    /// Every audit finding fixed.
    Hardened,
}

impl std::str::FromStr for EngineProfile {
    type Err = RaffleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "audited" => Ok(Self::Audited),
            "hardened" => Ok(Self::Hardened),
            other => Err(RaffleError::config(format!("Unknown profile '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateCheck {
    /// Compare every active entry against every other one.
    Pairwise,
    /// Incrementally maintained membership set.
    Indexed,
    /// Players may hold several entries.
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionOrder {
    /// Clear the slot and emit before sending value.
    EffectsFirst,
    /// Send value, then clear the slot. Re-enterable.
    TransferFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutOrder {
    MintThenTransfer,
    TransferThenMint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeWidth {
    /// 64-bit accumulator, silent wraparound.
    Narrow64,
    /// Full `Balance` width, overflow reverts.
    Wide128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawPolicy {
    /// Engine balance must equal accrued fees exactly.
    ExactBalance,
    /// Accrued fees are withdrawable whenever the balance covers them.
    AccruedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawSource {
    /// Hash of caller, timestamp and block entropy, resolved in one call.
    BlockHash,
    /// Commit/reveal oracle, resolved by a later callback.
    Oracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RafflePolicies {
    pub duplicate_check: DuplicateCheck,
    pub refund_order: InteractionOrder,
    pub payout_order: PayoutOrder,
    pub fee_width: FeeWidth,
    pub withdraw: WithdrawPolicy,
    pub draw: DrawSource,
    pub reject_zero_fee_address: bool,
}

impl RafflePolicies {
    pub fn for_profile(profile: EngineProfile) -> Self {
        match profile {
            EngineProfile::Audited => Self {
                duplicate_check: DuplicateCheck::Pairwise,
                refund_order: InteractionOrder::TransferFirst,
                payout_order: PayoutOrder::TransferThenMint,
                fee_width: FeeWidth::Narrow64,
                withdraw: WithdrawPolicy::ExactBalance,
                draw: DrawSource::BlockHash,
                reject_zero_fee_address: false,
            },
            EngineProfile::Hardened => Self {
                duplicate_check: DuplicateCheck::Indexed,
                refund_order: InteractionOrder::EffectsFirst,
                payout_order: PayoutOrder::MintThenTransfer,
                fee_width: FeeWidth::Wide128,
                withdraw: WithdrawPolicy::AccruedOnly,
                draw: DrawSource::Oracle,
                reject_zero_fee_address: true,
            },
        }
    }
}

impl Default for RafflePolicies {
    fn default() -> Self {
        Self::for_profile(EngineProfile::Hardened)
    }
}

/// Immutable raffle parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleConfig {
    pub entrance_fee: Balance,
    pub fee_address: Address,
    #[serde(with = "duration_seconds")]
    pub raffle_duration: Duration,
    pub oracle: Address,
    pub policies: RafflePolicies,
}

impl RaffleConfig {
    pub fn new(entrance_fee: Balance, fee_address: Address, raffle_duration: Duration) -> Self {
        Self::for_profile(entrance_fee, fee_address, raffle_duration, EngineProfile::Hardened)
    }

    pub fn for_profile(
        entrance_fee: Balance,
        fee_address: Address,
        raffle_duration: Duration,
        profile: EngineProfile,
    ) -> Self {
        Self {
            entrance_fee,
            fee_address,
            raffle_duration,
            oracle: Address::from_label(DEFAULT_ORACLE_LABEL),
            policies: RafflePolicies::for_profile(profile),
        }
    }

    pub fn with_policies(mut self, policies: RafflePolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_duplicate_check(mut self, check: DuplicateCheck) -> Self {
        self.policies.duplicate_check = check;
        self
    }

    pub fn with_refund_order(mut self, order: InteractionOrder) -> Self {
        self.policies.refund_order = order;
        self
    }

    pub fn with_payout_order(mut self, order: PayoutOrder) -> Self {
        self.policies.payout_order = order;
        self
    }

    pub fn with_fee_width(mut self, width: FeeWidth) -> Self {
        self.policies.fee_width = width;
        self
    }

    pub fn with_withdraw_policy(mut self, policy: WithdrawPolicy) -> Self {
        self.policies.withdraw = policy;
        self
    }

    pub fn with_draw_source(mut self, draw: DrawSource) -> Self {
        self.policies.draw = draw;
        self
    }

    pub fn with_oracle(mut self, oracle: Address) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.entrance_fee == 0 {
            return Err(RaffleError::config("Entrance fee must be greater than 0"));
        }

        if self.raffle_duration <= Duration::zero() {
            return Err(RaffleError::config("Raffle duration must be greater than 0"));
        }

        if self.policies.reject_zero_fee_address && self.fee_address.is_zero() {
            return Err(RaffleError::config("Fee address cannot be the zero address"));
        }

        if self.policies.draw == DrawSource::Oracle && self.oracle.is_zero() {
            return Err(RaffleError::config("Oracle address cannot be the zero address"));
        }

        Ok(())
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom("duration out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee_address() -> Address {
        Address::from_label("fee")
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = RaffleConfig::new(1_000, fee_address(), Duration::zero());
        assert_eq!(config.validate().unwrap_err().code(), "invalid-config");
    }

    #[test]
    fn test_validate_rejects_zero_fee() {
        let config = RaffleConfig::new(0, fee_address(), Duration::days(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_fee_address_only_rejected_when_hardened() {
        let audited =
            RaffleConfig::for_profile(1, Address::ZERO, Duration::days(1), EngineProfile::Audited);
        assert!(audited.validate().is_ok());

        let hardened = RaffleConfig::new(1, Address::ZERO, Duration::days(1));
        assert!(hardened.validate().is_err());
    }

    #[test]
    fn test_profile_presets() {
        let audited = RafflePolicies::for_profile(EngineProfile::Audited);
        assert_eq!(audited.duplicate_check, DuplicateCheck::Pairwise);
        assert_eq!(audited.fee_width, FeeWidth::Narrow64);
        assert_eq!(audited.draw, DrawSource::BlockHash);

        let hardened = RafflePolicies::default();
        assert_eq!(hardened.refund_order, InteractionOrder::EffectsFirst);
        assert_eq!(hardened.payout_order, PayoutOrder::MintThenTransfer);
        assert_eq!(hardened.withdraw, WithdrawPolicy::AccruedOnly);
    }

    #[test]
    fn test_config_serde_keeps_duration() {
        let config = RaffleConfig::new(10, fee_address(), Duration::hours(6))
            .with_fee_width(FeeWidth::Narrow64);
        let json = serde_json::to_string(&config).unwrap();
        let back: RaffleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("Audited".parse::<EngineProfile>().unwrap(), EngineProfile::Audited);
        assert!("strict".parse::<EngineProfile>().is_err());
    }
}
