//! Ready-made [`Receiver`] implementations for adversarial scenarios.

use crate::collectible::CollectibleRegistry;
use crate::engine::Raffle;
use crate::error::{RaffleError, Result};
use crate::runtime::{Receiver, Runtime};
use crate::types::{Address, Balance, TokenId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Re-enters `refund` with its own slot every time the raffle pays it, for
/// as long as the raffle can still cover one more entrance fee.
#[derive(Debug)]
pub struct ReentrantRefunder {
    address: Address,
    max_reentries: u32,
    propagate_errors: bool,
    index: Cell<Option<usize>>,
    reentries: Cell<u32>,
    received: Cell<Balance>,
    errors: RefCell<Vec<RaffleError>>,
}

impl ReentrantRefunder {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            max_reentries: 64,
            propagate_errors: false,
            index: Cell::new(None),
            reentries: Cell::new(0),
            received: Cell::new(0),
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Fail the outer transfer when a nested refund fails, instead of
    /// swallowing the error.
    pub fn propagating(mut self) -> Self {
        self.propagate_errors = true;
        self
    }

    pub fn with_max_reentries(mut self, max: u32) -> Self {
        self.max_reentries = max;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reentries(&self) -> u32 {
        self.reentries.get()
    }

    pub fn received(&self) -> Balance {
        self.received.get()
    }

    pub fn errors(&self) -> Vec<RaffleError> {
        self.errors.borrow().clone()
    }

    /// Register, buy one entry and refund it. Returns what the refund
    /// paid out in total.
    pub fn attack(self: &Rc<Self>, raffle: &mut Raffle, rt: &mut Runtime) -> Result<Balance> {
        rt.register_receiver(self.address, self.clone());

        let fee = raffle.entrance_fee();
        raffle.enter(rt, self.address, fee, &[self.address])?;
        let index = raffle
            .active_player_index(&self.address)
            .ok_or_else(|| RaffleError::Internal("attacker entry missing".to_string()))?;
        self.index.set(Some(index));

        let before = self.received.get();
        raffle.refund(rt, self.address, index)?;

        tracing::info!(
            "Reentrant refund at slot {} collected {} over {} re-entries",
            index,
            self.received.get() - before,
            self.reentries.get()
        );
        Ok(self.received.get() - before)
    }
}

impl Receiver for ReentrantRefunder {
    fn on_value(
        &self,
        raffle: &mut Raffle,
        rt: &mut Runtime,
        from: Address,
        amount: Balance,
    ) -> Result<()> {
        self.received.set(self.received.get() + amount);

        let Some(index) = self.index.get() else {
            return Ok(());
        };
        if from != raffle.address()
            || rt.balance_of(&raffle.address()) < raffle.entrance_fee()
            || self.reentries.get() >= self.max_reentries
        {
            return Ok(());
        }

        self.reentries.set(self.reentries.get() + 1);
        if let Err(e) = raffle.refund(rt, self.address, index) {
            tracing::debug!("Nested refund rejected: {}", e);
            self.errors.borrow_mut().push(e.clone());
            if self.propagate_errors {
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Refuses every incoming value transfer.
#[derive(Debug, Default)]
pub struct RejectingReceiver;

impl Receiver for RejectingReceiver {
    fn on_value(
        &self,
        _raffle: &mut Raffle,
        _rt: &mut Runtime,
        _from: Address,
        _amount: Balance,
    ) -> Result<()> {
        Err(RaffleError::Internal(
            "receiver does not accept value".to_string(),
        ))
    }
}

/// What a payout recipient could see about the engine mid-payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutObservation {
    pub amount: Balance,
    pub collectibles_held: u64,
    pub total_fees: Balance,
    pub active_players: usize,
}

/// Records engine and registry state at each value receipt, and the token
/// ids it is handed.
#[derive(Debug)]
pub struct PayoutObserver {
    address: Address,
    observations: RefCell<Vec<PayoutObservation>>,
    tokens: RefCell<Vec<TokenId>>,
}

impl PayoutObserver {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            observations: RefCell::new(Vec::new()),
            tokens: RefCell::new(Vec::new()),
        }
    }

    pub fn observations(&self) -> Vec<PayoutObservation> {
        self.observations.borrow().clone()
    }

    pub fn tokens(&self) -> Vec<TokenId> {
        self.tokens.borrow().clone()
    }
}

impl Receiver for PayoutObserver {
    fn on_value(
        &self,
        raffle: &mut Raffle,
        rt: &mut Runtime,
        _from: Address,
        amount: Balance,
    ) -> Result<()> {
        self.observations.borrow_mut().push(PayoutObservation {
            amount,
            collectibles_held: rt.registry().balance_of(&self.address),
            total_fees: raffle.total_fees(),
            active_players: raffle.active_player_count(),
        });
        Ok(())
    }

    fn on_collectible(&self, _raffle: &mut Raffle, _rt: &mut Runtime, token: TokenId) -> Result<()> {
        self.tokens.borrow_mut().push(token);
        Ok(())
    }
}

/// Calls `select_winner` again from inside its own payout, through both the
/// value and the collectible hook, and records how each attempt ended.
#[derive(Debug)]
pub struct PayoutReentrant {
    address: Address,
    attempts: RefCell<Vec<Result<()>>>,
}

impl PayoutReentrant {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            attempts: RefCell::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<Result<()>> {
        self.attempts.borrow().clone()
    }

    fn reenter(&self, raffle: &mut Raffle, rt: &mut Runtime) {
        let outcome = raffle.select_winner(rt, self.address).map(|_| ());
        if let Err(e) = &outcome {
            tracing::debug!("Re-entrant select_winner rejected: {}", e);
        }
        self.attempts.borrow_mut().push(outcome);
    }
}

impl Receiver for PayoutReentrant {
    fn on_value(
        &self,
        raffle: &mut Raffle,
        rt: &mut Runtime,
        _from: Address,
        _amount: Balance,
    ) -> Result<()> {
        self.reenter(raffle, rt);
        Ok(())
    }

    fn on_collectible(&self, raffle: &mut Raffle, rt: &mut Runtime, _token: TokenId) -> Result<()> {
        self.reenter(raffle, rt);
        Ok(())
    }
}

/// What a nested `withdraw_fees` saw and returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawAttempt {
    pub total_fees: Balance,
    pub outcome: Result<Balance>,
}

/// Fee recipient that calls `withdraw_fees` again the first time it is
/// paid.
#[derive(Debug, Default)]
pub struct ReentrantWithdrawer {
    entered: Cell<bool>,
    received: Cell<Balance>,
    attempts: RefCell<Vec<WithdrawAttempt>>,
}

impl ReentrantWithdrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Balance {
        self.received.get()
    }

    pub fn attempts(&self) -> Vec<WithdrawAttempt> {
        self.attempts.borrow().clone()
    }
}

impl Receiver for ReentrantWithdrawer {
    fn on_value(
        &self,
        raffle: &mut Raffle,
        rt: &mut Runtime,
        _from: Address,
        amount: Balance,
    ) -> Result<()> {
        self.received.set(self.received.get() + amount);
        if self.entered.replace(true) {
            return Ok(());
        }

        let total_fees = raffle.total_fees();
        let outcome = raffle.withdraw_fees(rt);
        if let Err(e) = &outcome {
            tracing::debug!("Re-entrant withdraw_fees rejected: {}", e);
        }
        self.attempts
            .borrow_mut()
            .push(WithdrawAttempt { total_fees, outcome });
        Ok(())
    }
}
