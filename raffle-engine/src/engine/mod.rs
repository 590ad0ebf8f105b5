use crate::collectible::Rarity;
use crate::config::{
    DrawSource, InteractionOrder, PayoutOrder, RaffleConfig, WithdrawPolicy, MIN_PLAYERS,
};
use crate::error::{RaffleError, Result};
use crate::events::RaffleEvent;
use crate::fees::{FeeAccumulator, PotSplit};
use crate::randomness::{self, HashCommitment};
use crate::roster::{DetachedRoster, PlayerRoster};
use crate::runtime::Runtime;
use crate::types::{Address, Balance, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;


/// Draw frozen between the randomness request and its fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDraw {
    pub request_id: Uuid,
    pub requested_by: Address,
    pub requested_at: DateTime<Utc>,
    pub commitment: Vec<u8>,
    pub players: Vec<Address>,
    pub split: PotSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReceipt {
    pub admitted: usize,
    /// Comparisons or membership lookups spent on the duplicate check.
    pub comparisons: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerReceipt {
    pub winner: Address,
    /// Position among the round's active players.
    pub winner_index: usize,
    pub players: usize,
    pub prize: Balance,
    pub fee: Balance,
    pub total_fees: Balance,
    pub token_id: TokenId,
    pub rarity: Rarity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Settled(WinnerReceipt),
    Pending { request_id: Uuid },
}

impl Selection {
    pub fn settled(self) -> Option<WinnerReceipt> {
        match self {
            Selection::Settled(receipt) => Some(receipt),
            Selection::Pending { .. } => None,
        }
    }
}

/// Inverse of one engine state change made inside an open call.
#[derive(Debug, Clone)]
enum Undo {
    Appended { len: usize },
    Cleared { index: usize, player: Address },
    Reset(DetachedRoster),
    Fees(FeeAccumulator),
    StartTime(DateTime<Utc>),
    PreviousWinner(Option<Address>),
    Pending(Option<PendingDraw>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RaffleState {
    roster: PlayerRoster,
    fees: FeeAccumulator,
    raffle_start_time: DateTime<Utc>,
    previous_winner: Option<Address>,
    pending: Option<PendingDraw>,
}

/// The raffle engine. Holds every piece of raffle state; value, clock and
/// collectibles come from the [`Runtime`] passed to each operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raffle {
    address: Address,
    config: RaffleConfig,
    state: RaffleState,
    #[serde(skip)]
    journal: Vec<Undo>,
    #[serde(skip)]
    depth: usize,
}

impl Raffle {
    pub fn new(address: Address, config: RaffleConfig, rt: &Runtime) -> Result<Self> {
        config.validate()?;
        if address.is_zero() {
            return Err(RaffleError::config("Raffle address cannot be the zero address"));
        }

        let state = RaffleState {
            roster: PlayerRoster::new(config.policies.duplicate_check),
            fees: FeeAccumulator::new(config.policies.fee_width),
            raffle_start_time: rt.now(),
            previous_winner: None,
            pending: None,
        };

        tracing::info!(
            "Raffle {} created: entrance fee {}, duration {}s",
            address,
            config.entrance_fee,
            config.raffle_duration.num_seconds()
        );

        Ok(Self {
            address,
            config,
            state,
            journal: Vec::new(),
            depth: 0,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn entrance_fee(&self) -> Balance {
        self.config.entrance_fee
    }

    pub fn players(&self) -> &[Address] {
        self.state.roster.slots()
    }

    pub fn active_player_count(&self) -> usize {
        self.state.roster.active_count()
    }

    pub fn raffle_start_time(&self) -> DateTime<Utc> {
        self.state.raffle_start_time
    }

    pub fn previous_winner(&self) -> Option<Address> {
        self.state.previous_winner
    }

    pub fn pending_draw(&self) -> Option<&PendingDraw> {
        self.state.pending.as_ref()
    }

    pub fn total_fees(&self) -> Balance {
        self.state.fees.total()
    }

    /// First active roster index of `player`.
    pub fn active_player_index(&self, player: &Address) -> Option<usize> {
        self.state.roster.position(player)
    }

    /// Index lookup as first shipped: `0` means both "found at
    /// position 0" and "not found".
    pub fn legacy_active_player_index(&self, player: &Address) -> usize {
        self.active_player_index(player).unwrap_or(0)
    }

    /// Add `players` to the roster. `value` is the amount attached by
    /// `caller` and must equal `entrance_fee * players.len()`.
    pub fn enter(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        value: Balance,
        players: &[Address],
    ) -> Result<EntryReceipt> {
        self.atomic(rt, "enter", |raffle, rt| {
            raffle.ensure_no_pending_draw()?;

            let expected = raffle
                .config
                .entrance_fee
                .checked_mul(players.len() as Balance)
                .ok_or(RaffleError::IncorrectPayment {
                    expected: Balance::MAX,
                    sent: value,
                })?;
            if value != expected {
                return Err(RaffleError::IncorrectPayment {
                    expected,
                    sent: value,
                });
            }
            if players.is_empty() {
                return Err(RaffleError::EmptyBatch);
            }

            let to = raffle.address;
            rt.send(raffle, caller, to, value)?;

            let len = raffle.state.roster.len();
            let comparisons = raffle.state.roster.admit(players)?;
            raffle.record(Undo::Appended { len });
            rt.emit(RaffleEvent::PlayersEntered {
                players: players.to_vec(),
            });

            tracing::info!(
                "{} player(s) entered raffle {} ({} active)",
                players.len(),
                raffle.address,
                raffle.state.roster.active_count()
            );
            tracing::debug!("Duplicate check cost: {} comparisons", comparisons);

            Ok(EntryReceipt {
                admitted: players.len(),
                comparisons,
            })
        })
    }

    /// Return the entrance fee for the slot at `index` to its owner.
    ///
    /// Checks run in order: index range, ownership, then the refunded
    /// sentinel. A refunded slot therefore reports `NotSlotOwner` to anyone
    /// but the zero address.
    pub fn refund(&mut self, rt: &mut Runtime, caller: Address, index: usize) -> Result<()> {
        self.atomic(rt, "refund", |raffle, rt| {
            raffle.ensure_no_pending_draw()?;

            let player = raffle
                .state
                .roster
                .get(index)
                .ok_or(RaffleError::InvalidIndex {
                    index,
                    len: raffle.state.roster.len(),
                })?;
            if player != caller {
                return Err(RaffleError::NotSlotOwner { index });
            }
            if player.is_zero() {
                return Err(RaffleError::SlotAlreadyEmpty { index });
            }

            let from = raffle.address;
            let amount = raffle.config.entrance_fee;

            match raffle.config.policies.refund_order {
                InteractionOrder::EffectsFirst => {
                    raffle.clear_slot(index);
                    rt.emit(RaffleEvent::RaffleRefunded { player });
                    rt.send(raffle, from, player, amount)?;
                }
                InteractionOrder::TransferFirst => {
                    rt.send(raffle, from, player, amount)?;
                    raffle.clear_slot(index);
                    rt.emit(RaffleEvent::RaffleRefunded { player });
                }
            }

            tracing::info!("Player {} refunded from slot {}", player, index);
            Ok(())
        })
    }

    /// Draw the round's winner once the duration has elapsed.
    ///
    /// With [`DrawSource::BlockHash`] the round settles immediately. With
    /// [`DrawSource::Oracle`] the active players and pot are frozen and the
    /// round settles in [`Raffle::fulfill_randomness`].
    pub fn select_winner(&mut self, rt: &mut Runtime, caller: Address) -> Result<Selection> {
        self.atomic(rt, "select_winner", |raffle, rt| {
            raffle.ensure_no_pending_draw()?;

            if rt.now() < raffle.state.raffle_start_time + raffle.config.raffle_duration {
                return Err(RaffleError::RaffleNotOver);
            }

            let players: Vec<Address> = raffle.state.roster.active().collect();
            if players.len() < MIN_PLAYERS {
                return Err(RaffleError::NotEnoughPlayers {
                    required: MIN_PLAYERS,
                    active: players.len(),
                });
            }

            let total = (players.len() as Balance)
                .checked_mul(raffle.config.entrance_fee)
                .ok_or(RaffleError::FeeOverflow)?;
            let split = PotSplit::of(total)?;

            match raffle.config.policies.draw {
                DrawSource::BlockHash => {
                    let entropy = rt.entropy();
                    let index = randomness::weak_winner_index(
                        &caller,
                        rt.now().timestamp(),
                        &entropy,
                        players.len(),
                    );
                    let rarity = Rarity::from_roll(randomness::weak_rarity_roll(&caller, &entropy));

                    let receipt = raffle.settle(rt, &players, index, split, rarity)?;
                    Ok(Selection::Settled(receipt))
                }
                DrawSource::Oracle => {
                    let request_id = Uuid::new_v4();
                    let commitment = rt.request_randomness(request_id);

                    let previous = raffle.state.pending.replace(PendingDraw {
                        request_id,
                        requested_by: caller,
                        requested_at: rt.now(),
                        commitment,
                        players,
                        split,
                    });
                    raffle.record(Undo::Pending(previous));
                    rt.emit(RaffleEvent::RandomnessRequested {
                        request_id,
                        players: raffle.state.roster.active_count(),
                    });

                    tracing::info!(
                        "Raffle {} requested randomness: {}",
                        raffle.address,
                        request_id
                    );
                    Ok(Selection::Pending { request_id })
                }
            }
        })
    }

    /// Oracle callback completing a pending draw.
    pub fn fulfill_randomness(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        request_id: Uuid,
        seed: &[u8],
    ) -> Result<WinnerReceipt> {
        self.atomic(rt, "fulfill_randomness", |raffle, rt| {
            if caller != raffle.config.oracle {
                return Err(RaffleError::UnauthorizedOracle(caller));
            }

            let draw = match &raffle.state.pending {
                Some(draw) if draw.request_id == request_id => draw.clone(),
                _ => return Err(RaffleError::UnknownRequest(request_id)),
            };
            if !HashCommitment::from_hash(draw.commitment.clone()).verify(seed) {
                return Err(RaffleError::InvalidRandomness);
            }

            let index = randomness::seeded_winner_index(seed, draw.players.len());
            let rarity = Rarity::from_roll(randomness::seeded_rarity_roll(seed));
            raffle.settle(rt, &draw.players, index, draw.split, rarity)
        })
    }

    /// Send every accrued fee to the fee address.
    pub fn withdraw_fees(&mut self, rt: &mut Runtime) -> Result<Balance> {
        self.atomic(rt, "withdraw_fees", |raffle, rt| {
            let balance = rt.balance_of(&raffle.address);
            let accrued = raffle.state.fees.total();

            match raffle.config.policies.withdraw {
                WithdrawPolicy::ExactBalance => {
                    if balance != accrued {
                        return Err(RaffleError::ActivePlayersPresent { balance, accrued });
                    }
                }
                WithdrawPolicy::AccruedOnly => {
                    if accrued == 0 {
                        return Err(RaffleError::NoFeesAccrued);
                    }
                    if balance < accrued {
                        return Err(RaffleError::ActivePlayersPresent { balance, accrued });
                    }
                }
            }

            let fees = raffle.state.fees;
            let amount = raffle.state.fees.take();
            raffle.record(Undo::Fees(fees));
            let recipient = raffle.config.fee_address;
            let from = raffle.address;
            rt.emit(RaffleEvent::FeesWithdrawn { recipient, amount });
            rt.send(raffle, from, recipient, amount)?;

            tracing::info!("Withdrew {} in fees to {}", amount, recipient);
            Ok(amount)
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut raffle: Raffle = serde_json::from_str(json)?;
        raffle.config.validate()?;
        raffle.state.roster.reindex();
        Ok(raffle)
    }

    fn settle(
        &mut self,
        rt: &mut Runtime,
        players: &[Address],
        index: usize,
        split: PotSplit,
        rarity: Rarity,
    ) -> Result<WinnerReceipt> {
        let winner = *players
            .get(index)
            .ok_or_else(|| RaffleError::Internal(format!("Winner index {} out of range", index)))?;
        let fees = self.state.fees;
        let total_fees = self.state.fees.accrue(split.fee)?;
        self.record(Undo::Fees(fees));

        let detached = self.state.roster.reset();
        self.record(Undo::Reset(detached));
        let start = std::mem::replace(&mut self.state.raffle_start_time, rt.now());
        self.record(Undo::StartTime(start));
        let previous = self.state.previous_winner.replace(winner);
        self.record(Undo::PreviousWinner(previous));
        let pending = self.state.pending.take();
        self.record(Undo::Pending(pending));

        let from = self.address;
        let token_id = match self.config.policies.payout_order {
            PayoutOrder::MintThenTransfer => {
                let token_id = rt.mint(self, winner, rarity)?;
                rt.emit(RaffleEvent::WinnerSelected {
                    winner,
                    prize: split.prize_pool,
                    token_id,
                    rarity,
                });
                rt.send(self, from, winner, split.prize_pool)?;
                token_id
            }
            PayoutOrder::TransferThenMint => {
                rt.send(self, from, winner, split.prize_pool)?;
                let token_id = rt.mint(self, winner, rarity)?;
                rt.emit(RaffleEvent::WinnerSelected {
                    winner,
                    prize: split.prize_pool,
                    token_id,
                    rarity,
                });
                token_id
            }
        };

        tracing::info!(
            "Raffle {} winner {}: prize {}, fee {}, collectible #{} {}",
            self.address,
            winner,
            split.prize_pool,
            split.fee,
            token_id,
            rarity
        );

        Ok(WinnerReceipt {
            winner,
            winner_index: index,
            players: players.len(),
            prize: split.prize_pool,
            fee: split.fee,
            total_fees,
            token_id,
            rarity,
        })
    }

    fn ensure_no_pending_draw(&self) -> Result<()> {
        match &self.state.pending {
            Some(draw) => Err(RaffleError::DrawInProgress(draw.request_id)),
            None => Ok(()),
        }
    }

    fn clear_slot(&mut self, index: usize) {
        if let Some(player) = self.state.roster.clear(index) {
            self.record(Undo::Cleared { index, player });
        }
    }

    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.journal.push(undo);
        }
    }

    fn undo(&mut self, undo: Undo) {
        let state = &mut self.state;
        match undo {
            Undo::Appended { len } => state.roster.truncate(len),
            Undo::Cleared { index, player } => state.roster.restore(index, player),
            Undo::Reset(detached) => state.roster.reattach(detached),
            Undo::Fees(fees) => state.fees = fees,
            Undo::StartTime(start) => state.raffle_start_time = start,
            Undo::PreviousWinner(winner) => state.previous_winner = winner,
            Undo::Pending(pending) => state.pending = pending,
        }
    }

    /// Run `op` as one call: on error, every engine and runtime change it
    /// made is undone, newest first. Calls nest through receiver hooks; the
    /// journal is dropped once the outermost call returns.
    fn atomic<T>(
        &mut self,
        rt: &mut Runtime,
        name: &str,
        op: impl FnOnce(&mut Self, &mut Runtime) -> Result<T>,
    ) -> Result<T> {
        let mark = self.journal.len();
        self.depth += 1;
        let checkpoint = rt.checkpoint();

        let result = op(self, rt);
        match &result {
            Ok(_) => rt.commit(checkpoint),
            Err(e) => {
                let undone = self.journal.split_off(mark);
                for undo in undone.into_iter().rev() {
                    self.undo(undo);
                }
                rt.rollback(checkpoint);
                tracing::warn!("Raffle {} {} reverted: {}", self.address, name, e);
            }
        }

        self.depth -= 1;
        if self.depth == 0 {
            self.journal.clear();
        }
        result
    }
}
