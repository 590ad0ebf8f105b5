use crate::types::{Address, Balance};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaffleError {
    #[error("Must send enough to enter raffle: expected {expected}, got {sent}")]
    IncorrectPayment { expected: Balance, sent: Balance },

    #[error("Cannot enter an empty batch of players")]
    EmptyBatch,

    #[error("Duplicate player: {0}")]
    DuplicatePlayer(Address),

    #[error("Player index {index} out of range (roster length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Only the player can refund slot {index}")]
    NotSlotOwner { index: usize },

    #[error("Player already refunded, or is not active (slot {index})")]
    SlotAlreadyEmpty { index: usize },

    #[error("Raffle not over")]
    RaffleNotOver,

    #[error("Need at least {required} players, have {active}")]
    NotEnoughPlayers { required: usize, active: usize },

    #[error("There are currently players active: balance {balance}, accrued fees {accrued}")]
    ActivePlayersPresent { balance: Balance, accrued: Balance },

    #[error("No fees accrued")]
    NoFeesAccrued,

    #[error("Fee accumulator overflow")]
    FeeOverflow,

    #[error("Transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: Address,
        amount: Balance,
        reason: String,
    },

    #[error("A winner draw is already in progress: {0}")]
    DrawInProgress(Uuid),

    #[error("Unknown randomness request: {0}")]
    UnknownRequest(Uuid),

    #[error("Caller {0} is not the randomness oracle")]
    UnauthorizedOracle(Address),

    #[error("Randomness does not match the oracle commitment")]
    InvalidRandomness,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Clock cannot move backwards")]
    ClockRegression,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RaffleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn transfer(to: Address, amount: Balance, reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            to,
            amount,
            reason: reason.into(),
        }
    }

    /// Stable reason code callers can match on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IncorrectPayment { .. } => "insufficient-payment",
            Self::EmptyBatch => "empty-batch",
            Self::DuplicatePlayer(_) => "duplicate-active-player",
            Self::InvalidIndex { .. } => "invalid-index",
            Self::NotSlotOwner { .. } => "caller-not-slot-owner",
            Self::SlotAlreadyEmpty { .. } => "slot-already-empty",
            Self::RaffleNotOver => "duration-not-elapsed",
            Self::NotEnoughPlayers { .. } => "below-minimum-player-count",
            Self::ActivePlayersPresent { .. } => "balance-mismatch",
            Self::NoFeesAccrued => "no-fees-accrued",
            Self::FeeOverflow => "fee-overflow",
            Self::TransferFailed { .. } => "transfer-failed",
            Self::DrawInProgress(_) => "draw-in-progress",
            Self::UnknownRequest(_) => "unknown-request",
            Self::UnauthorizedOracle(_) => "unauthorized-oracle",
            Self::InvalidRandomness => "invalid-randomness",
            Self::InvalidConfig(_) => "invalid-config",
            Self::ClockRegression => "clock-regression",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for RaffleError {
    fn from(err: serde_json::Error) -> Self {
        RaffleError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_table_row() {
        let errors = [
            RaffleError::IncorrectPayment { expected: 2, sent: 1 },
            RaffleError::DuplicatePlayer(Address::ZERO),
            RaffleError::NotSlotOwner { index: 0 },
            RaffleError::SlotAlreadyEmpty { index: 0 },
            RaffleError::RaffleNotOver,
            RaffleError::NotEnoughPlayers { required: 4, active: 1 },
            RaffleError::ActivePlayersPresent { balance: 1, accrued: 0 },
        ];

        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_transfer_helper() {
        let err = RaffleError::transfer(Address::ZERO, 5, "rejected");
        assert_eq!(err.code(), "transfer-failed");
        assert!(err.to_string().contains("rejected"));
    }
}
