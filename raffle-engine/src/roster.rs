use crate::config::DuplicateCheck;
use crate::error::{RaffleError, Result};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered entries of the current round.
///
/// Refunded slots keep their position and hold [`Address::ZERO`], so the
/// indices handed out to other players stay valid until the round resets.
/// Contents taken out of a roster by a reset.
#[derive(Debug, Clone, Default)]
pub struct DetachedRoster {
    slots: Vec<Address>,
    members: HashMap<Address, usize>,
}

impl DetachedRoster {
    pub fn slots(&self) -> &[Address] {
        &self.slots
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRoster {
    slots: Vec<Address>,
    check: DuplicateCheck,
    #[serde(skip)]
    members: HashMap<Address, usize>,
}

impl PlayerRoster {
    pub fn new(check: DuplicateCheck) -> Self {
        Self {
            slots: Vec::new(),
            check,
            members: HashMap::new(),
        }
    }

    pub fn duplicate_check(&self) -> DuplicateCheck {
        self.check
    }

    pub fn slots(&self) -> &[Address] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Address> {
        self.slots.get(index).copied()
    }

    pub fn active(&self) -> impl Iterator<Item = Address> + '_ {
        self.slots.iter().copied().filter(|addr| !addr.is_zero())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Append `batch` and enforce uniqueness over the whole active roster.
    ///
    /// Returns the number of comparisons (pairwise) or membership lookups
    /// (indexed) the check performed. On a duplicate nothing is kept.
    pub fn admit(&mut self, batch: &[Address]) -> Result<u64> {
        let start = self.slots.len();
        self.slots.extend_from_slice(batch);

        let outcome = match self.check {
            DuplicateCheck::Pairwise => Self::pairwise_scan(&self.slots),
            DuplicateCheck::Indexed => self.index_batch(start, batch),
            DuplicateCheck::Off => Ok(0),
        };

        if outcome.is_err() {
            self.slots.truncate(start);
        }
        outcome
    }

    fn pairwise_scan(slots: &[Address]) -> Result<u64> {
        let mut comparisons = 0u64;
        for i in 0..slots.len() {
            if slots[i].is_zero() {
                continue;
            }
            for j in (i + 1)..slots.len() {
                if slots[j].is_zero() {
                    continue;
                }
                comparisons += 1;
                if slots[i] == slots[j] {
                    return Err(RaffleError::DuplicatePlayer(slots[i]));
                }
            }
        }
        Ok(comparisons)
    }

    fn index_batch(&mut self, start: usize, batch: &[Address]) -> Result<u64> {
        let mut lookups = 0u64;
        for (offset, addr) in batch.iter().enumerate() {
            lookups += 1;
            if addr.is_zero() {
                continue;
            }
            if self.members.contains_key(addr) {
                for added in &batch[..offset] {
                    self.members.remove(added);
                }
                return Err(RaffleError::DuplicatePlayer(*addr));
            }
            self.members.insert(*addr, start + offset);
        }
        Ok(lookups)
    }

    /// Overwrite `index` with the sentinel.
    pub fn clear(&mut self, index: usize) -> Option<Address> {
        let slot = self.slots.get_mut(index)?;
        let previous = std::mem::replace(slot, Address::ZERO);
        if self.check == DuplicateCheck::Indexed {
            self.members.remove(&previous);
        }
        Some(previous)
    }

    /// First active index holding `addr`.
    pub fn position(&self, addr: &Address) -> Option<usize> {
        if addr.is_zero() {
            return None;
        }
        match self.check {
            DuplicateCheck::Indexed => self.members.get(addr).copied(),
            _ => self.slots.iter().position(|slot| slot == addr),
        }
    }

    /// Empty the roster, handing back its previous contents.
    pub fn reset(&mut self) -> DetachedRoster {
        DetachedRoster {
            slots: std::mem::take(&mut self.slots),
            members: std::mem::take(&mut self.members),
        }
    }

    /// Put back contents removed by [`PlayerRoster::reset`].
    pub(crate) fn reattach(&mut self, detached: DetachedRoster) {
        self.slots = detached.slots;
        self.members = detached.members;
    }

    /// Drop every slot from `len` onwards. Cost is proportional to the
    /// number of dropped slots.
    pub(crate) fn truncate(&mut self, len: usize) {
        if self.check == DuplicateCheck::Indexed {
            for (offset, addr) in self.slots.iter().enumerate().skip(len) {
                if self.members.get(addr) == Some(&offset) {
                    self.members.remove(addr);
                }
            }
        }
        self.slots.truncate(len);
    }

    /// Write `addr` back into a cleared slot.
    pub(crate) fn restore(&mut self, index: usize, addr: Address) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = addr;
            if self.check == DuplicateCheck::Indexed && !addr.is_zero() {
                self.members.insert(addr, index);
            }
        }
    }

    /// Rebuild the membership index after deserialization.
    pub fn reindex(&mut self) {
        self.members.clear();
        if self.check != DuplicateCheck::Indexed {
            return;
        }
        for (index, addr) in self.slots.iter().enumerate() {
            if !addr.is_zero() {
                self.members.entry(*addr).or_insert(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(range: std::ops::Range<u64>) -> Vec<Address> {
        range.map(Address::from_low_u64).collect()
    }

    #[test]
    fn test_duplicate_within_batch_leaves_roster_unchanged() {
        for check in [DuplicateCheck::Pairwise, DuplicateCheck::Indexed] {
            let mut roster = PlayerRoster::new(check);
            roster.admit(&players(1..4)).unwrap();
            let before = roster.slots().to_vec();

            let batch = vec![Address::from_low_u64(10), Address::from_low_u64(10)];
            let err = roster.admit(&batch).unwrap_err();

            assert_eq!(err, RaffleError::DuplicatePlayer(Address::from_low_u64(10)));
            assert_eq!(roster.slots(), before.as_slice());
            assert_eq!(roster.position(&Address::from_low_u64(10)), None);
        }
    }

    #[test]
    fn test_duplicate_against_existing_entry() {
        for check in [DuplicateCheck::Pairwise, DuplicateCheck::Indexed] {
            let mut roster = PlayerRoster::new(check);
            roster.admit(&players(1..5)).unwrap();

            let batch = vec![Address::from_low_u64(9), Address::from_low_u64(2)];
            assert!(roster.admit(&batch).is_err());
            assert_eq!(roster.len(), 4);
            assert_eq!(roster.position(&Address::from_low_u64(9)), None);
        }
    }

    #[test]
    fn test_off_policy_accepts_repeats() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Off);
        let repeated = vec![Address::from_low_u64(1); 3];
        assert_eq!(roster.admit(&repeated).unwrap(), 0);
        assert_eq!(roster.active_count(), 3);
    }

    #[test]
    fn test_refunded_address_can_reenter() {
        for check in [DuplicateCheck::Pairwise, DuplicateCheck::Indexed] {
            let mut roster = PlayerRoster::new(check);
            roster.admit(&players(1..4)).unwrap();
            assert_eq!(roster.clear(1), Some(Address::from_low_u64(2)));
            assert_eq!(roster.get(1), Some(Address::ZERO));

            roster.admit(&[Address::from_low_u64(2)]).unwrap();
            assert_eq!(roster.position(&Address::from_low_u64(2)), Some(3));
            assert_eq!(roster.active_count(), 3);
        }
    }

    #[test]
    fn test_two_refunded_slots_do_not_count_as_duplicates() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Pairwise);
        roster.admit(&players(1..5)).unwrap();
        roster.clear(0);
        roster.clear(1);
        assert!(roster.admit(&[Address::from_low_u64(7)]).is_ok());
    }

    #[test]
    fn test_pairwise_comparisons_are_quadratic() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Pairwise);
        let comparisons = roster.admit(&players(1..11)).unwrap();
        assert_eq!(comparisons, 10 * 9 / 2);

        // one more address re-scans everything
        let comparisons = roster.admit(&[Address::from_low_u64(11)]).unwrap();
        assert_eq!(comparisons, 11 * 10 / 2);
    }

    #[test]
    fn test_indexed_lookups_scale_with_batch() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Indexed);
        roster.admit(&players(1..1_001)).unwrap();
        assert_eq!(roster.admit(&players(2_000..2_005)).unwrap(), 5);
    }

    #[test]
    fn test_truncate_and_restore_undo_changes() {
        for check in [DuplicateCheck::Pairwise, DuplicateCheck::Indexed] {
            let mut roster = PlayerRoster::new(check);
            roster.admit(&players(1..4)).unwrap();
            roster.admit(&players(4..6)).unwrap();

            roster.truncate(3);
            assert_eq!(roster.slots(), players(1..4).as_slice());
            assert_eq!(roster.position(&Address::from_low_u64(4)), None);

            let cleared = roster.clear(0).unwrap();
            roster.restore(0, cleared);
            assert_eq!(roster.position(&cleared), Some(0));
            assert!(roster.admit(&[cleared]).is_err());
        }
    }

    #[test]
    fn test_reset_hands_back_contents() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Indexed);
        roster.admit(&players(1..4)).unwrap();

        let detached = roster.reset();
        assert!(roster.is_empty());
        assert_eq!(detached.slots().len(), 3);

        roster.reattach(detached);
        assert_eq!(roster.position(&Address::from_low_u64(2)), Some(1));
    }

    #[test]
    fn test_reindex_after_deserialize() {
        let mut roster = PlayerRoster::new(DuplicateCheck::Indexed);
        roster.admit(&players(1..4)).unwrap();
        let json = serde_json::to_string(&roster).unwrap();

        let mut restored: PlayerRoster = serde_json::from_str(&json).unwrap();
        restored.reindex();
        assert_eq!(restored.position(&Address::from_low_u64(3)), Some(2));
        assert!(restored.admit(&[Address::from_low_u64(1)]).is_err());
    }
}
