use crate::types::{Address, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const COMMON_RARITY: u8 = 70;
pub const RARE_RARITY: u8 = 25;
pub const LEGENDARY_RARITY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Legendary,
}

impl Rarity {
    /// Map a roll in `0..100` onto the 70 / 25 / 5 weighting.
    pub fn from_roll(roll: u8) -> Self {
        if roll <= COMMON_RARITY {
            Rarity::Common
        } else if roll <= COMMON_RARITY + RARE_RARITY {
            Rarity::Rare
        } else {
            Rarity::Legendary
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Common => "Pug",
            Rarity::Rare => "Shiba Inu",
            Rarity::Legendary => "St. Bernard",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collectible {
    pub id: TokenId,
    pub owner: Address,
    pub rarity: Rarity,
}

/// Mint-and-query surface of the external collectible contract.
pub trait CollectibleRegistry {
    fn mint(&mut self, to: Address, rarity: Rarity) -> TokenId;
    fn owner_of(&self, token: TokenId) -> Option<Address>;
    fn rarity_of(&self, token: TokenId) -> Option<Rarity>;
    fn balance_of(&self, owner: &Address) -> u64;
    fn total_supply(&self) -> u64;
}

/// In-memory registry; token ids are assigned sequentially from 0.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tokens: BTreeMap<TokenId, Collectible>,
    balances: HashMap<Address, u64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the most recently minted token.
    pub(crate) fn revoke_last(&mut self) -> Option<Collectible> {
        let (_, token) = self.tokens.pop_last()?;
        if let Some(balance) = self.balances.get_mut(&token.owner) {
            *balance = balance.saturating_sub(1);
        }
        Some(token)
    }

    pub fn tokens_of(&self, owner: &Address) -> Vec<Collectible> {
        self.tokens
            .values()
            .filter(|token| token.owner == *owner)
            .copied()
            .collect()
    }
}

impl CollectibleRegistry for Registry {
    fn mint(&mut self, to: Address, rarity: Rarity) -> TokenId {
        let id = self.tokens.len() as TokenId;
        self.tokens.insert(
            id,
            Collectible {
                id,
                owner: to,
                rarity,
            },
        );
        *self.balances.entry(to).or_default() += 1;
        id
    }

    fn owner_of(&self, token: TokenId) -> Option<Address> {
        self.tokens.get(&token).map(|t| t.owner)
    }

    fn rarity_of(&self, token: TokenId) -> Option<Rarity> {
        self.tokens.get(&token).map(|t| t.rarity)
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u64 {
        self.tokens.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_thresholds() {
        assert_eq!(Rarity::from_roll(0), Rarity::Common);
        assert_eq!(Rarity::from_roll(70), Rarity::Common);
        assert_eq!(Rarity::from_roll(71), Rarity::Rare);
        assert_eq!(Rarity::from_roll(95), Rarity::Rare);
        assert_eq!(Rarity::from_roll(96), Rarity::Legendary);
        assert_eq!(Rarity::from_roll(99), Rarity::Legendary);
    }

    #[test]
    fn test_mint_assigns_sequential_ids() {
        let mut registry = Registry::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        assert_eq!(registry.mint(alice, Rarity::Common), 0);
        assert_eq!(registry.mint(bob, Rarity::Legendary), 1);
        assert_eq!(registry.mint(alice, Rarity::Rare), 2);

        assert_eq!(registry.total_supply(), 3);
        assert_eq!(registry.balance_of(&alice), 2);
        assert_eq!(registry.owner_of(1), Some(bob));
        assert_eq!(registry.rarity_of(2), Some(Rarity::Rare));
        assert_eq!(registry.owner_of(9), None);
        assert_eq!(registry.tokens_of(&alice).len(), 2);
    }

    #[test]
    fn test_revoke_last_frees_the_id() {
        let mut registry = Registry::new();
        let alice = Address::from_label("alice");
        registry.mint(alice, Rarity::Common);
        registry.mint(alice, Rarity::Rare);

        let revoked = registry.revoke_last().unwrap();
        assert_eq!(revoked.id, 1);
        assert_eq!(registry.balance_of(&alice), 1);
        assert_eq!(registry.mint(alice, Rarity::Legendary), 1);
    }
}
