use crate::config::CliConfig;
use crate::report::{Report, ReportBody, ScalingSample};
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_engine::{Address, DuplicateCheck, PlayerRoster};

#[derive(Args, Debug)]
pub struct ScalingArgs {
    /// Roster sizes to measure, comma separated
    #[arg(short, long, value_delimiter = ',', default_values_t = vec![100, 200, 400, 800])]
    pub sizes: Vec<usize>,
}

pub async fn handle_scaling(args: ScalingArgs, config: &CliConfig) -> Result<()> {
    if args.sizes.is_empty() {
        bail!("Give at least one roster size");
    }

    let samples = args
        .sizes
        .iter()
        .map(|&size| measure(size))
        .collect::<Result<Vec<_>>>()?;

    let body = ReportBody::Scaling { samples };
    print_body(&body);

    let report = Report::new(None, None, body);
    let path = report.save(&config.reports_dir()).await?;
    println!("Report saved to {}", path.display());

    Ok(())
}

/// Cost of admitting one new address on top of `size` existing players.
pub(crate) fn measure(size: usize) -> Result<ScalingSample> {
    Ok(ScalingSample {
        roster_size: size,
        pairwise: marginal_cost(DuplicateCheck::Pairwise, size)?,
        indexed: marginal_cost(DuplicateCheck::Indexed, size)?,
    })
}

fn marginal_cost(check: DuplicateCheck, size: usize) -> Result<u64> {
    let mut roster = PlayerRoster::new(check);
    let existing: Vec<Address> = (1..=size as u64).map(Address::from_low_u64).collect();
    roster.admit(&existing)?;
    Ok(roster.admit(&[Address::from_label("newcomer")])?)
}

pub fn print_body(body: &ReportBody) {
    let ReportBody::Scaling { samples } = body else {
        return;
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Roster size", "Pairwise", "Growth", "Indexed"]);

    let mut previous: Option<u64> = None;
    for sample in samples {
        let growth = match previous {
            Some(prev) if prev > 0 => format!("x{:.2}", sample.pairwise as f64 / prev as f64),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            sample.roster_size.to_string(),
            sample.pairwise.to_string(),
            growth,
            sample.indexed.to_string(),
        ]);
        previous = Some(sample.pairwise);
    }

    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairwise_cost_grows_quadratically() {
        let small = measure(150).unwrap();
        let large = measure(300).unwrap();

        let ratio = large.pairwise as f64 / small.pairwise as f64;
        assert!((3.9..4.1).contains(&ratio), "ratio was {}", ratio);
        assert_eq!(small.indexed, 1);
        assert_eq!(large.indexed, 1);
    }

    #[test]
    fn test_empty_roster() {
        let sample = measure(0).unwrap();
        assert_eq!(sample.pairwise, 0);
        assert_eq!(sample.indexed, 1);
    }
}
