//! Simulated execution environment.
//!
//! Provides the three guarantees the engine relies on: native value
//! transfer, a monotonic clock and all-or-nothing calls. Transfers and
//! collectible deliveries run the recipient's [`Receiver`] hook
//! synchronously, which is where reentrancy happens.

use crate::collectible::{CollectibleRegistry, Rarity, Registry};
use crate::config::DEFAULT_ORACLE_LABEL;
use crate::engine::{Raffle, WinnerReceipt};
use crate::error::{RaffleError, Result};
use crate::events::RaffleEvent;
use crate::randomness::{CommitRevealOracle, HashCommitment};
use crate::types::{Address, Balance, TokenId};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

/// Code attached to an address. Hooks may call back into the engine.
pub trait Receiver {
    fn on_value(
        &self,
        _raffle: &mut Raffle,
        _rt: &mut Runtime,
        _from: Address,
        _amount: Balance,
    ) -> Result<()> {
        Ok(())
    }

    fn on_collectible(&self, _raffle: &mut Raffle, _rt: &mut Runtime, _token: TokenId) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<Address, Balance>,
}

impl Ledger {
    pub fn balance_of(&self, addr: &Address) -> Balance {
        self.balances.get(addr).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, to: Address, amount: Balance) -> Result<()> {
        let balance = self.balances.entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| RaffleError::transfer(to, amount, "balance overflow"))?;
        Ok(())
    }

    /// Move `amount`; either both balances change or neither does.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<()> {
        let available = self.balance_of(&from);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            RaffleError::transfer(
                to,
                amount,
                format!("{} holds only {}", from, available),
            )
        })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or_else(|| RaffleError::transfer(to, amount, "balance overflow"))?;

        self.balances.insert(from, remaining);
        self.balances.insert(to, credited);
        Ok(())
    }

    pub fn total(&self) -> Balance {
        self.balances.values().sum()
    }

    fn set_balance(&mut self, addr: Address, balance: Balance) {
        self.balances.insert(addr, balance);
    }
}

/// Inverse of one runtime mutation made inside an open frame.
enum Undo {
    Balance { addr: Address, previous: Balance },
    Minted,
    Requested(Uuid),
    Forgotten(Uuid, HashCommitment),
    Clock { now: DateTime<Utc>, entropy: [u8; 32] },
    Receiver {
        addr: Address,
        previous: Option<Rc<dyn Receiver>>,
    },
}

/// Position in the undo journal and event log where a frame opened.
#[derive(Debug)]
pub struct Checkpoint {
    journal: usize,
    events: usize,
}

pub struct Runtime {
    ledger: Ledger,
    now: DateTime<Utc>,
    entropy: [u8; 32],
    registry: Registry,
    oracle: CommitRevealOracle,
    events: Vec<RaffleEvent>,
    receivers: HashMap<Address, Rc<dyn Receiver>>,
    journal: Vec<Undo>,
    depth: usize,
}

impl Runtime {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            ledger: Ledger::default(),
            now,
            entropy: Sha256::digest(b"genesis").into(),
            registry: Registry::new(),
            oracle: CommitRevealOracle::new(Address::from_label(DEFAULT_ORACLE_LABEL)),
            events: Vec::new(),
            receivers: HashMap::new(),
            journal: Vec::new(),
            depth: 0,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move the clock forward; block entropy is re-derived from the new time.
    pub fn advance(&mut self, by: Duration) -> Result<()> {
        self.set_time(self.now + by)
    }

    pub fn set_time(&mut self, to: DateTime<Utc>) -> Result<()> {
        if to < self.now {
            return Err(RaffleError::ClockRegression);
        }
        self.record_clock();
        self.now = to;
        self.entropy = Sha256::new()
            .chain_update(self.entropy)
            .chain_update(to.timestamp().to_be_bytes())
            .finalize()
            .into();
        Ok(())
    }

    /// Chain-supplied randomness value of the current block.
    pub fn entropy(&self) -> [u8; 32] {
        self.entropy
    }

    pub fn set_entropy(&mut self, entropy: [u8; 32]) {
        self.record_clock();
        self.entropy = entropy;
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance_of(&self, addr: &Address) -> Balance {
        self.ledger.balance_of(addr)
    }

    /// Mint native currency to `to`.
    pub fn deal(&mut self, to: Address, amount: Balance) -> Result<()> {
        self.record_balance(to);
        self.ledger.credit(to, amount)
    }

    /// Move value without running the recipient's hook, the way a
    /// self-destructing contract forces funds onto an address.
    pub fn force_send(&mut self, from: Address, to: Address, amount: Balance) -> Result<()> {
        self.record_balance(from);
        self.record_balance(to);
        self.ledger.transfer(from, to, amount)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn oracle(&self) -> &CommitRevealOracle {
        &self.oracle
    }

    /// Ask the oracle to commit to a seed for `request_id`.
    pub(crate) fn request_randomness(&mut self, request_id: Uuid) -> Vec<u8> {
        let commitment = self.oracle.request(request_id);
        self.record(Undo::Requested(request_id));
        commitment
    }

    fn forget_request(&mut self, request_id: &Uuid) {
        if let Some(commitment) = self.oracle.forget(request_id) {
            self.record(Undo::Forgotten(*request_id, commitment));
        }
    }

    pub fn events(&self) -> &[RaffleEvent] {
        &self.events
    }

    pub(crate) fn emit(&mut self, event: RaffleEvent) {
        tracing::debug!("event: {:?}", event);
        self.events.push(event);
    }

    pub fn register_receiver(&mut self, addr: Address, receiver: Rc<dyn Receiver>) {
        let previous = self.receivers.insert(addr, receiver);
        self.record(Undo::Receiver { addr, previous });
    }

    pub fn remove_receiver(&mut self, addr: &Address) {
        let previous = self.receivers.remove(addr);
        self.record(Undo::Receiver {
            addr: *addr,
            previous,
        });
    }

    pub fn has_receiver(&self, addr: &Address) -> bool {
        self.receivers.contains_key(addr)
    }

    /// Open a frame. Every frame must be closed by [`Runtime::commit`] or
    /// [`Runtime::rollback`]; frames nest.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            journal: self.journal.len(),
            events: self.events.len(),
        }
    }

    /// Keep the frame's changes. They are still undone if an enclosing
    /// frame rolls back.
    pub fn commit(&mut self, _checkpoint: Checkpoint) {
        self.close_frame();
    }

    /// Undo every change made since `checkpoint`, newest first.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let undone = self.journal.split_off(checkpoint.journal);
        for undo in undone.into_iter().rev() {
            self.undo(undo);
        }
        self.events.truncate(checkpoint.events);
        self.close_frame();
    }

    fn close_frame(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.journal.push(undo);
        }
    }

    fn record_balance(&mut self, addr: Address) {
        if self.depth > 0 {
            let previous = self.ledger.balance_of(&addr);
            self.journal.push(Undo::Balance { addr, previous });
        }
    }

    fn record_clock(&mut self) {
        self.record(Undo::Clock {
            now: self.now,
            entropy: self.entropy,
        });
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Balance { addr, previous } => self.ledger.set_balance(addr, previous),
            Undo::Minted => {
                self.registry.revoke_last();
            }
            Undo::Requested(request_id) => {
                self.oracle.forget(&request_id);
            }
            Undo::Forgotten(request_id, commitment) => self.oracle.restore(request_id, commitment),
            Undo::Clock { now, entropy } => {
                self.now = now;
                self.entropy = entropy;
            }
            Undo::Receiver { addr, previous } => match previous {
                Some(receiver) => {
                    self.receivers.insert(addr, receiver);
                }
                None => {
                    self.receivers.remove(&addr);
                }
            },
        }
    }

    /// Transfer value and run the recipient's hook. A failing hook fails
    /// the transfer.
    pub fn send(
        &mut self,
        raffle: &mut Raffle,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()> {
        self.record_balance(from);
        self.record_balance(to);
        self.ledger.transfer(from, to, amount)?;

        if let Some(receiver) = self.receivers.get(&to).cloned() {
            receiver
                .on_value(raffle, self, from, amount)
                .map_err(|e| RaffleError::transfer(to, amount, e.to_string()))?;
        }
        Ok(())
    }

    /// Mint a collectible and notify the recipient, like a safe mint.
    pub fn mint(&mut self, raffle: &mut Raffle, to: Address, rarity: Rarity) -> Result<TokenId> {
        let token = self.registry.mint(to, rarity);
        self.record(Undo::Minted);

        if let Some(receiver) = self.receivers.get(&to).cloned() {
            receiver.on_collectible(raffle, self, token)?;
        }
        Ok(token)
    }

    /// Reveal the oracle seed for the raffle's pending draw and deliver it.
    pub fn deliver_randomness(&mut self, raffle: &mut Raffle) -> Result<WinnerReceipt> {
        let request_id = raffle
            .pending_draw()
            .map(|draw| draw.request_id)
            .ok_or_else(|| RaffleError::Internal("No draw pending".to_string()))?;
        let seed = self
            .oracle
            .reveal(&request_id)
            .ok_or(RaffleError::UnknownRequest(request_id))?;

        let oracle = self.oracle.address();
        let receipt = raffle.fulfill_randomness(self, oracle, request_id, &seed)?;
        self.forget_request(&request_id);
        Ok(receipt)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("now", &self.now)
            .field("accounts", &self.ledger.balances.len())
            .field("collectibles", &self.registry.total_supply())
            .field("events", &self.events.len())
            .field("receivers", &self.receivers.len())
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn runtime() -> Runtime {
        Runtime::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_transfer_requires_funds() {
        let mut rt = runtime();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        rt.deal(alice, 10).unwrap();

        let err = rt.force_send(alice, bob, 11).unwrap_err();
        assert_eq!(err.code(), "transfer-failed");
        assert_eq!(rt.balance_of(&alice), 10);

        rt.force_send(alice, bob, 4).unwrap();
        assert_eq!(rt.balance_of(&alice), 6);
        assert_eq!(rt.balance_of(&bob), 4);
        assert_eq!(rt.ledger().total(), 10);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut rt = runtime();
        let start = rt.now();
        let entropy = rt.entropy();

        rt.advance(Duration::hours(1)).unwrap();
        assert_eq!(rt.now(), start + Duration::hours(1));
        assert_ne!(rt.entropy(), entropy);

        assert_eq!(rt.set_time(start), Err(RaffleError::ClockRegression));
    }

    #[test]
    fn test_rollback_restores_balances_and_events() {
        let mut rt = runtime();
        let alice = Address::from_label("alice");
        rt.deal(alice, 5).unwrap();
        let checkpoint = rt.checkpoint();

        rt.deal(alice, 100).unwrap();
        rt.emit(RaffleEvent::RaffleRefunded { player: alice });
        rt.rollback(checkpoint);

        assert_eq!(rt.balance_of(&alice), 5);
        assert!(rt.events().is_empty());
    }

    #[test]
    fn test_rollback_restores_clock_and_receivers() {
        struct Silent;
        impl Receiver for Silent {}

        let mut rt = runtime();
        let alice = Address::from_label("alice");
        let start = rt.now();
        let entropy = rt.entropy();
        let checkpoint = rt.checkpoint();

        rt.advance(Duration::days(3)).unwrap();
        rt.set_entropy([7u8; 32]);
        rt.register_receiver(alice, Rc::new(Silent));
        let token = rt.registry.mint(alice, Rarity::Rare);
        rt.record(Undo::Minted);
        let request = Uuid::new_v4();
        rt.request_randomness(request);
        rt.rollback(checkpoint);

        assert_eq!(rt.now(), start);
        assert_eq!(rt.entropy(), entropy);
        assert!(!rt.has_receiver(&alice));
        assert_eq!(rt.registry().owner_of(token), None);
        assert_eq!(rt.oracle().pending(), 0);
    }

    #[test]
    fn test_inner_commit_is_undone_by_outer_rollback() {
        let mut rt = runtime();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        rt.deal(alice, 10).unwrap();

        let outer = rt.checkpoint();
        let inner = rt.checkpoint();
        rt.force_send(alice, bob, 4).unwrap();
        rt.commit(inner);
        assert_eq!(rt.balance_of(&bob), 4);

        rt.rollback(outer);
        assert_eq!(rt.balance_of(&alice), 10);
        assert_eq!(rt.balance_of(&bob), 0);
        assert!(rt.journal.is_empty());
    }

    #[test]
    fn test_changes_outside_a_frame_are_not_journaled() {
        let mut rt = runtime();
        rt.deal(Address::from_label("alice"), 10).unwrap();
        rt.advance(Duration::hours(1)).unwrap();
        assert!(rt.journal.is_empty());
    }

    #[test]
    fn test_failed_transfer_changes_nothing() {
        let mut rt = runtime();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        rt.deal(alice, 3).unwrap();
        rt.deal(bob, Balance::MAX).unwrap();

        assert!(rt.force_send(alice, bob, 2).is_err());
        assert_eq!(rt.balance_of(&alice), 3);
        assert_eq!(rt.balance_of(&bob), Balance::MAX);
    }
}
