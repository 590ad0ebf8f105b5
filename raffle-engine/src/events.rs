use crate::collectible::Rarity;
use crate::types::{Address, Balance, TokenId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notifications emitted by the engine. Rolled back with the call that
/// emitted them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleEvent {
    PlayersEntered {
        players: Vec<Address>,
    },
    RaffleRefunded {
        player: Address,
    },
    RandomnessRequested {
        request_id: Uuid,
        players: usize,
    },
    WinnerSelected {
        winner: Address,
        prize: Balance,
        token_id: TokenId,
        rarity: Rarity,
    },
    FeesWithdrawn {
        recipient: Address,
        amount: Balance,
    },
}
