use super::{format_amount, round_players, sponsor_entry};
use crate::config::CliConfig;
use crate::report::{Report, ReportBody};
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_engine::{
    settle_round, Address, Balance, EngineProfile, Raffle, RaffleConfig, ReentrantRefunder,
    Runtime,
};
use std::rc::Rc;

/// Entrance fee large enough that four players push a 64-bit fee counter
/// past its limit within three rounds.
pub const OVERFLOW_ENTRANCE_FEE: Balance = 10_000_000_000_000_000_000;

#[derive(Subcommand)]
pub enum AttackCommands {
    /// Re-enter refund from the refunded player's receive hook
    Reentrancy {
        /// Engine profile (audited, hardened)
        #[arg(long)]
        profile: Option<EngineProfile>,
        /// Honest players entered before the attacker
        #[arg(short, long, default_value_t = 4)]
        players: usize,
    },
    /// Drive the accrued fee counter past u64::MAX
    Overflow {
        /// Engine profile (audited, hardened)
        #[arg(long)]
        profile: Option<EngineProfile>,
        /// Rounds to play
        #[arg(short, long, default_value_t = 4)]
        rounds: usize,
        /// Entrance fee in wei
        #[arg(long, default_value_t = OVERFLOW_ENTRANCE_FEE)]
        fee: Balance,
    },
}

pub async fn handle_attack_command(cmd: AttackCommands, config: &CliConfig) -> Result<()> {
    let (profile, fee, body) = match cmd {
        AttackCommands::Reentrancy { profile, players } => {
            let profile = profile.unwrap_or(config.default_profile);
            let body = run_reentrancy(profile, config.entrance_fee, players, config)?;
            (profile, config.entrance_fee, body)
        }
        AttackCommands::Overflow {
            profile,
            rounds,
            fee,
        } => {
            let profile = profile.unwrap_or(config.default_profile);
            let body = run_overflow(profile, fee, rounds, config)?;
            (profile, fee, body)
        }
    };

    println!("{:?} profile, entrance fee {}", profile, format_amount(fee));
    print_body(&body);

    let report = Report::new(Some(profile), Some(fee), body);
    let path = report.save(&config.reports_dir()).await?;
    println!("Report saved to {}", path.display());

    Ok(())
}

fn deploy(profile: EngineProfile, fee: Balance, config: &CliConfig) -> Result<(Raffle, Runtime)> {
    let rt = Runtime::new();
    let raffle_config = RaffleConfig::for_profile(
        fee,
        Address::from_label("fee-recipient"),
        config.raffle_duration(),
        profile,
    );
    let raffle = raffle_engine::deploy(raffle_config, &rt)?;
    Ok((raffle, rt))
}

pub(crate) fn run_reentrancy(
    profile: EngineProfile,
    fee: Balance,
    players: usize,
    config: &CliConfig,
) -> Result<ReportBody> {
    let (mut raffle, mut rt) = deploy(profile, fee, config)?;
    sponsor_entry(&mut raffle, &mut rt, &round_players(1, players))?;

    let attacker = Rc::new(ReentrantRefunder::new(Address::from_label("attacker")));
    rt.deal(attacker.address(), fee)?;

    let engine_before = rt.balance_of(&raffle.address());
    let outcome = attacker.attack(&mut raffle, &mut rt);
    let engine_after = rt.balance_of(&raffle.address());

    let error = match outcome {
        Ok(received) => {
            tracing::info!("Attacker collected {} in one refund call", received);
            None
        }
        Err(e) => Some(e.to_string()),
    };

    Ok(ReportBody::Reentrancy {
        engine_before,
        engine_after,
        attacker_received: attacker.received(),
        reentries: attacker.reentries(),
        error,
    })
}

pub(crate) fn run_overflow(
    profile: EngineProfile,
    fee: Balance,
    rounds: usize,
    config: &CliConfig,
) -> Result<ReportBody> {
    let (mut raffle, mut rt) = deploy(profile, fee, config)?;
    let keeper = Address::from_label("keeper");

    let mut accrued = Vec::with_capacity(rounds);
    let mut error = None;
    for round in 1..=rounds {
        if let Err(e) = play_round(&mut raffle, &mut rt, round, keeper, config) {
            tracing::warn!("Round {} reverted: {}", round, e);
            error = Some(e.to_string());
            break;
        }
        accrued.push(raffle.total_fees());
    }

    let wrapped_at = accrued.windows(2).position(|w| w[1] < w[0]).map(|i| i + 1);

    Ok(ReportBody::Overflow {
        accrued,
        wrapped_at,
        error,
    })
}

fn play_round(
    raffle: &mut Raffle,
    rt: &mut Runtime,
    round: usize,
    keeper: Address,
    config: &CliConfig,
) -> Result<()> {
    sponsor_entry(raffle, rt, &round_players(round, 4))?;
    rt.advance(config.raffle_duration())?;
    settle_round(raffle, rt, keeper)?;
    Ok(())
}

pub fn print_body(body: &ReportBody) {
    match body {
        ReportBody::Reentrancy {
            engine_before,
            engine_after,
            attacker_received,
            reentries,
            error,
        } => {
            println!("Engine balance before: {}", format_amount(*engine_before));
            println!("Engine balance after:  {}", format_amount(*engine_after));
            println!(
                "Attacker received {} over {} re-entries",
                format_amount(*attacker_received),
                reentries
            );
            if let Some(error) = error {
                println!("Refund reverted: {}", error);
            }
        }
        ReportBody::Overflow {
            accrued,
            wrapped_at,
            error,
        } => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Round", "Accrued fees (wei)", "Above u64::MAX", "Note"]);

            for (i, total) in accrued.iter().enumerate() {
                let note = if *wrapped_at == Some(i) { "wrapped" } else { "" };
                table.add_row(vec![
                    (i + 1).to_string(),
                    total.to_string(),
                    (*total > u64::MAX as Balance).to_string(),
                    note.to_string(),
                ]);
            }

            println!("{}", table);
            if let Some(error) = error {
                println!("Stopped early: {}", error);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrancy_drains_only_audited_engine() {
        let config = CliConfig::default();
        let fee = config.entrance_fee;

        let audited = run_reentrancy(EngineProfile::Audited, fee, 4, &config).unwrap();
        let hardened = run_reentrancy(EngineProfile::Hardened, fee, 4, &config).unwrap();

        match audited {
            ReportBody::Reentrancy {
                engine_before,
                engine_after,
                attacker_received,
                ..
            } => {
                assert_eq!(engine_before, 4 * fee);
                assert_eq!(engine_after, 0);
                assert_eq!(attacker_received, 5 * fee);
            }
            other => panic!("unexpected body: {:?}", other),
        }

        match hardened {
            ReportBody::Reentrancy {
                engine_before,
                engine_after,
                attacker_received,
                error,
                ..
            } => {
                assert_eq!(engine_after, engine_before);
                assert_eq!(attacker_received, fee);
                assert!(error.is_none());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_overflow_wraps_only_narrow_counter() {
        let config = CliConfig::default();

        let audited = run_overflow(EngineProfile::Audited, OVERFLOW_ENTRANCE_FEE, 3, &config).unwrap();
        let hardened = run_overflow(EngineProfile::Hardened, OVERFLOW_ENTRANCE_FEE, 3, &config).unwrap();

        match audited {
            ReportBody::Overflow {
                accrued, wrapped_at, ..
            } => {
                assert_eq!(accrued.len(), 3);
                assert_eq!(wrapped_at, Some(2));
            }
            other => panic!("unexpected body: {:?}", other),
        }

        match hardened {
            ReportBody::Overflow {
                accrued,
                wrapped_at,
                error,
            } => {
                assert_eq!(wrapped_at, None);
                assert!(error.is_none());
                assert!(accrued[2] > u64::MAX as Balance);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
