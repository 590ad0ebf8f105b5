use super::{attack, format_amount, scaling, simulate};
use crate::config::CliConfig;
use crate::report::{Report, ReportBody};
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Show a saved report
    Show {
        /// Report file
        file: PathBuf,
    },
    /// List saved reports
    List,
}

pub async fn handle_report_command(cmd: ReportCommands, config: &CliConfig) -> Result<()> {
    match cmd {
        ReportCommands::Show { file } => {
            let report = Report::load(&file).await?;

            println!("Report {} ({})", report.id, report.kind());
            println!("  Created: {}", report.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(profile) = report.profile {
                println!("  Profile: {:?}", profile);
            }
            if let Some(fee) = report.entrance_fee {
                println!("  Entrance fee: {}", format_amount(fee));
            }
            println!();

            match &report.body {
                ReportBody::Simulation { .. } => simulate::print_body(&report.body),
                ReportBody::Reentrancy { .. } | ReportBody::Overflow { .. } => {
                    attack::print_body(&report.body)
                }
                ReportBody::Scaling { .. } => scaling::print_body(&report.body),
            }
        }

        ReportCommands::List => {
            let dir = config.reports_dir();
            if !dir.exists() {
                println!("No reports found in {}", dir.display());
                return Ok(());
            }

            let mut entries = tokio::fs::read_dir(&dir).await?;
            let mut reports = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                match Report::load(&path).await {
                    Ok(report) => reports.push((path, report)),
                    Err(e) => tracing::debug!("Skipping {}: {}", path.display(), e),
                }
            }

            if reports.is_empty() {
                println!("No reports found in {}", dir.display());
                return Ok(());
            }

            reports.sort_by_key(|(_, report)| report.created_at);

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Kind", "Profile", "Created", "File"]);
            for (path, report) in &reports {
                table.add_row(vec![
                    report.kind().to_string(),
                    report
                        .profile
                        .map(|p| format!("{:?}", p))
                        .unwrap_or_else(|| "-".to_string()),
                    report.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    path.display().to_string(),
                ]);
            }

            println!("{}", table);
        }
    }

    Ok(())
}
