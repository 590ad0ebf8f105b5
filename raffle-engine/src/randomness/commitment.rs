use crate::types::Address;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// Trait for commitment schemes
pub trait CommitmentScheme {
    type Secret: ?Sized;
    type Commitment;

    fn commit(secret: &Self::Secret) -> Self::Commitment;
    fn verify(commitment: &Self::Commitment, secret: &Self::Secret) -> bool;
}

/// Hash based commitment impl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashCommitment {
    hash: Vec<u8>,
    #[serde(skip)]
    secret: Option<Vec<u8>>,
}

impl HashCommitment {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            hash: Self::commit(&secret),
            secret: Some(secret),
        }
    }

    pub fn from_hash(hash: Vec<u8>) -> Self {
        Self { hash, secret: None }
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    pub fn verify(&self, secret: &[u8]) -> bool {
        <Self as CommitmentScheme>::verify(&self.hash, secret)
    }
}

impl CommitmentScheme for HashCommitment {
    type Secret = [u8];
    type Commitment = Vec<u8>;

    fn commit(secret: &[u8]) -> Vec<u8> {
        Sha256::digest(secret).to_vec()
    }

    fn verify(commitment: &Vec<u8>, secret: &[u8]) -> bool {
        Sha256::digest(secret).as_slice() == commitment.as_slice()
    }
}

/// Rnd secret for commitment
pub fn generate_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Randomness provider that commits to a seed when a draw is requested and
/// reveals it in a later call.
#[derive(Debug, Clone)]
pub struct CommitRevealOracle {
    address: Address,
    requests: HashMap<Uuid, HashCommitment>,
}

impl CommitRevealOracle {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            requests: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Commit to a fresh seed for `request_id` and return the commitment.
    pub fn request(&mut self, request_id: Uuid) -> Vec<u8> {
        let commitment = HashCommitment::new(generate_secret());
        let hash = commitment.hash().to_vec();
        self.requests.insert(request_id, commitment);

        tracing::debug!("Oracle {} committed to request {}", self.address, request_id);
        hash
    }

    pub fn reveal(&self, request_id: &Uuid) -> Option<Vec<u8>> {
        self.requests
            .get(request_id)
            .and_then(|c| c.secret())
            .map(<[u8]>::to_vec)
    }

    pub fn forget(&mut self, request_id: &Uuid) -> Option<HashCommitment> {
        self.requests.remove(request_id)
    }

    pub(crate) fn restore(&mut self, request_id: Uuid, commitment: HashCommitment) {
        self.requests.insert(request_id, commitment);
    }

    pub fn pending(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_scheme() {
        let secret = generate_secret();
        let commitment = HashCommitment::new(secret.clone());

        assert!(commitment.verify(&secret));
        assert!(!commitment.verify(b"wrong secret"));
    }

    #[test]
    fn test_commitment_from_hash_has_no_secret() {
        let commitment = HashCommitment::new(b"seed".to_vec());
        let public = HashCommitment::from_hash(commitment.hash().to_vec());

        assert!(public.secret().is_none());
        assert!(public.verify(b"seed"));
    }

    #[test]
    fn test_oracle_reveals_committed_seed() {
        let mut oracle = CommitRevealOracle::new(Address::from_label("oracle"));
        let id = Uuid::new_v4();
        let hash = oracle.request(id);

        let seed = oracle.reveal(&id).unwrap();
        assert!(HashCommitment::from_hash(hash).verify(&seed));

        oracle.forget(&id);
        assert!(oracle.reveal(&id).is_none());
        assert_eq!(oracle.pending(), 0);
    }
}
