pub mod attack;
pub mod report;
pub mod scaling;
pub mod simulate;

pub use attack::{handle_attack_command, AttackCommands};
pub use report::{handle_report_command, ReportCommands};
pub use scaling::{handle_scaling, ScalingArgs};
pub use simulate::{handle_simulate, SimulateArgs};

use anyhow::{anyhow, Result};
use raffle_engine::{Address, Balance, EntryReceipt, Raffle, Runtime};

const WEI_PER_ETHER: f64 = 1e18;

pub fn format_amount(amount: Balance) -> String {
    format!("{} wei ({:.6} ETH)", amount, amount as f64 / WEI_PER_ETHER)
}

/// Distinct entrants for one round.
pub(crate) fn round_players(round: usize, count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| Address::from_label(&format!("player-{}-{}", round, i)))
        .collect()
}

/// Fund a sponsor account and enter `players` on its behalf.
pub(crate) fn sponsor_entry(
    raffle: &mut Raffle,
    rt: &mut Runtime,
    players: &[Address],
) -> Result<EntryReceipt> {
    let sponsor = Address::from_label("sponsor");
    let value = raffle
        .entrance_fee()
        .checked_mul(players.len() as Balance)
        .ok_or_else(|| {
            anyhow!(
                "Entering {} players at {} each overflows a 128-bit balance",
                players.len(),
                raffle.entrance_fee()
            )
        })?;
    rt.deal(sponsor, value)?;
    Ok(raffle.enter(rt, sponsor, value, players)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raffle_engine::{EngineProfile, RaffleConfig};

    #[test]
    fn test_sponsor_entry_rejects_overflowing_value() {
        let mut rt = Runtime::new();
        let config = RaffleConfig::for_profile(
            Balance::MAX / 2,
            Address::from_label("fee-recipient"),
            chrono::Duration::days(1),
            EngineProfile::Hardened,
        );
        let mut raffle = raffle_engine::deploy(config, &rt).unwrap();

        let err = sponsor_entry(&mut raffle, &mut rt, &round_players(1, 4)).unwrap_err();

        assert!(err.to_string().contains("overflows"), "{}", err);
        assert!(raffle.players().is_empty());
        assert_eq!(rt.balance_of(&Address::from_label("sponsor")), 0);
    }
}
