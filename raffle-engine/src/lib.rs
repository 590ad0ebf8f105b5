//! Raffle and collectible-mint engine
//!
//! Players pay an entrance fee to join a round, a winner is drawn once the
//! round's duration has elapsed, the winner takes 80% of the pot plus a
//! collectible and the operator accrues the remaining 20% as fees.
//!
//! Every audit finding of the deployed contract can be reproduced through
//! [`EngineProfile::Audited`] and is fixed in [`EngineProfile::Hardened`].
//! The engine runs against a simulated [`Runtime`] that provides value
//! transfer, a clock and all-or-nothing calls.

pub mod collectible;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod randomness;
pub mod receivers;
pub mod roster;
pub mod runtime;
pub mod types;

pub use collectible::{Collectible, CollectibleRegistry, Rarity, Registry};
pub use config::{
    DrawSource, DuplicateCheck, EngineProfile, FeeWidth, InteractionOrder, PayoutOrder,
    RaffleConfig, RafflePolicies, WithdrawPolicy, MIN_PLAYERS,
};
pub use engine::{EntryReceipt, PendingDraw, Raffle, Selection, WinnerReceipt};
pub use error::{RaffleError, Result};
pub use events::RaffleEvent;
pub use fees::{FeeAccumulator, PotSplit};
pub use receivers::{
    PayoutObservation, PayoutObserver, PayoutReentrant, ReentrantRefunder, ReentrantWithdrawer,
    RejectingReceiver, WithdrawAttempt,
};
pub use roster::{DetachedRoster, PlayerRoster};
pub use runtime::{Checkpoint, Ledger, Receiver, Runtime};
pub use types::{Address, Balance, TokenId};

/// Deploy a raffle at a fresh address on `rt`.
pub fn deploy(config: RaffleConfig, rt: &Runtime) -> Result<Raffle> {
    let address = Address::from_label(&format!("raffle-{}", uuid::Uuid::new_v4()));
    Raffle::new(address, config, rt)
}

/// Run a round to completion: resolve the draw synchronously or, for an
/// oracle-backed raffle, deliver the oracle's randomness right away.
pub fn settle_round(raffle: &mut Raffle, rt: &mut Runtime, caller: Address) -> Result<WinnerReceipt> {
    match raffle.select_winner(rt, caller)? {
        Selection::Settled(receipt) => Ok(receipt),
        Selection::Pending { .. } => rt.deliver_randomness(raffle),
    }
}
