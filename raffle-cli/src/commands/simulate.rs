use super::{format_amount, round_players, sponsor_entry};
use crate::config::CliConfig;
use crate::report::{Report, ReportBody, RoundSummary};
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_engine::{settle_round, Address, Balance, EngineProfile, RaffleConfig, Runtime, MIN_PLAYERS};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of rounds to run
    #[arg(short, long, default_value_t = 3)]
    pub rounds: usize,

    /// Players entering each round
    #[arg(short, long, default_value_t = 4)]
    pub players: usize,

    /// Entrance fee in wei
    #[arg(long)]
    pub fee: Option<Balance>,

    /// Engine profile (audited, hardened)
    #[arg(long)]
    pub profile: Option<EngineProfile>,

    /// Withdraw accrued fees after the last round
    #[arg(long)]
    pub withdraw: bool,
}

pub async fn handle_simulate(args: SimulateArgs, config: &CliConfig) -> Result<()> {
    let profile = args.profile.unwrap_or(config.default_profile);
    let fee = args.fee.unwrap_or(config.entrance_fee);

    if args.players < MIN_PLAYERS {
        bail!("A round needs at least {} players", MIN_PLAYERS);
    }

    println!(
        "Simulating {} round(s) of {} players, entrance fee {}, {:?} profile",
        args.rounds,
        args.players,
        format_amount(fee),
        profile
    );

    let body = run_simulation(&args, profile, fee, config)?;
    print_body(&body);

    let report = Report::new(Some(profile), Some(fee), body);
    let path = report.save(&config.reports_dir()).await?;
    println!("Report saved to {}", path.display());

    Ok(())
}

pub(crate) fn run_simulation(
    args: &SimulateArgs,
    profile: EngineProfile,
    fee: Balance,
    config: &CliConfig,
) -> Result<ReportBody> {
    let duration = config.raffle_duration();
    let mut rt = Runtime::new();
    let raffle_config =
        RaffleConfig::for_profile(fee, Address::from_label("fee-recipient"), duration, profile);
    let mut raffle = raffle_engine::deploy(raffle_config, &rt)?;
    let keeper = Address::from_label("keeper");

    let mut rounds = Vec::with_capacity(args.rounds);
    for round in 1..=args.rounds {
        sponsor_entry(&mut raffle, &mut rt, &round_players(round, args.players))?;
        rt.advance(duration)?;

        let receipt = settle_round(&mut raffle, &mut rt, keeper)?;
        tracing::debug!("Round {} settled: {:?}", round, receipt);

        rounds.push(RoundSummary {
            round,
            winner: receipt.winner,
            players: receipt.players,
            prize: receipt.prize,
            fee: receipt.fee,
            total_fees: receipt.total_fees,
            token_id: receipt.token_id,
            rarity: receipt.rarity,
        });
    }

    let (withdrawn, withdraw_error) = if args.withdraw {
        match raffle.withdraw_fees(&mut rt) {
            Ok(amount) => (Some(amount), None),
            Err(e) => {
                tracing::warn!("Fee withdrawal failed: {}", e);
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(ReportBody::Simulation {
        rounds,
        withdrawn,
        withdraw_error,
    })
}

pub fn print_body(body: &ReportBody) {
    let ReportBody::Simulation {
        rounds,
        withdrawn,
        withdraw_error,
    } = body
    else {
        return;
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Round",
        "Winner",
        "Players",
        "Prize (wei)",
        "Fee (wei)",
        "Accrued fees (wei)",
        "Collectible",
    ]);

    for round in rounds {
        table.add_row(vec![
            round.round.to_string(),
            round.winner.to_string(),
            round.players.to_string(),
            round.prize.to_string(),
            round.fee.to_string(),
            round.total_fees.to_string(),
            format!("#{} {}", round.token_id, round.rarity),
        ]);
    }

    println!("{}", table);

    if let Some(amount) = withdrawn {
        println!("Withdrew {} to the fee address", format_amount(*amount));
    }
    if let Some(error) = withdraw_error {
        println!("Fee withdrawal failed: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(rounds: usize, withdraw: bool) -> SimulateArgs {
        SimulateArgs {
            rounds,
            players: 5,
            fee: None,
            profile: None,
            withdraw,
        }
    }

    #[test]
    fn test_simulation_accrues_fees_each_round() {
        let config = CliConfig::default();
        let fee = config.entrance_fee;

        for profile in [EngineProfile::Audited, EngineProfile::Hardened] {
            let body = run_simulation(&args(3, true), profile, fee, &config).unwrap();
            let ReportBody::Simulation {
                rounds, withdrawn, ..
            } = body
            else {
                panic!("expected a simulation body");
            };

            assert_eq!(rounds.len(), 3);
            assert!(rounds.iter().all(|r| r.prize + r.fee <= 5 * fee));
            assert_eq!(rounds[2].total_fees, 3 * rounds[0].fee);
            assert_eq!(withdrawn, Some(rounds[2].total_fees));
        }
    }

    #[test]
    fn test_simulation_with_overflowing_fee_fails_cleanly() {
        let config = CliConfig::default();
        let mut args = args(2, true);
        args.players = 4;

        let err = run_simulation(&args, EngineProfile::Hardened, Balance::MAX / 2, &config)
            .unwrap_err();
        assert!(err.to_string().contains("overflows"), "{}", err);
    }

    #[test]
    fn test_simulation_without_withdrawal() {
        let config = CliConfig::default();
        let body = run_simulation(&args(1, false), EngineProfile::Hardened, 1_000, &config).unwrap();
        match body {
            ReportBody::Simulation {
                withdrawn,
                withdraw_error,
                ..
            } => {
                assert!(withdrawn.is_none());
                assert!(withdraw_error.is_none());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
