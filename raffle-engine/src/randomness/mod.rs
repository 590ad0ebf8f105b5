//! Winner and rarity draws.
//!
//! The block-hash draw is deliberately weak: every input is known to, or
//! chosen by, whoever submits the call. The seeded draw consumes a seed the
//! commit/reveal oracle committed to before the outcome could be previewed.

pub mod commitment;

pub use commitment::{generate_secret, CommitRevealOracle, CommitmentScheme, HashCommitment};

use crate::types::Address;
use sha2::{Digest, Sha256};

/// Upper bound (exclusive) of a rarity roll.
pub const RARITY_ROLL_RANGE: u128 = 100;

/// Index into `len` active players from caller, timestamp and block entropy.
pub fn weak_winner_index(caller: &Address, timestamp: i64, entropy: &[u8; 32], len: usize) -> usize {
    let digest = Sha256::new()
        .chain_update(caller.as_bytes())
        .chain_update(timestamp.to_be_bytes())
        .chain_update(entropy)
        .finalize();
    reduce(&digest, len as u128) as usize
}

/// Rarity roll in `0..100` from caller and block entropy.
pub fn weak_rarity_roll(caller: &Address, entropy: &[u8; 32]) -> u8 {
    let digest = Sha256::new()
        .chain_update(caller.as_bytes())
        .chain_update(entropy)
        .finalize();
    reduce(&digest, RARITY_ROLL_RANGE) as u8
}

pub fn seeded_winner_index(seed: &[u8], len: usize) -> usize {
    let digest = Sha256::new().chain_update(seed).finalize();
    reduce(&digest, len as u128) as usize
}

pub fn seeded_rarity_roll(seed: &[u8]) -> u8 {
    let digest = Sha256::new()
        .chain_update(seed)
        .chain_update(b"rarity")
        .finalize();
    reduce(&digest, RARITY_ROLL_RANGE) as u8
}

fn reduce(digest: &[u8], modulus: u128) -> u128 {
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(head) % modulus
}
