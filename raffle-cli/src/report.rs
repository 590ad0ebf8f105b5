//! Saved run reports. One JSON file per run under the data directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use raffle_engine::{Address, Balance, EngineProfile, Rarity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Absent for runs that compare policies rather than profiles.
    pub profile: Option<EngineProfile>,
    pub entrance_fee: Option<Balance>,
    pub body: ReportBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportBody {
    Simulation {
        rounds: Vec<RoundSummary>,
        withdrawn: Option<Balance>,
        withdraw_error: Option<String>,
    },
    Reentrancy {
        engine_before: Balance,
        engine_after: Balance,
        attacker_received: Balance,
        reentries: u32,
        error: Option<String>,
    },
    Overflow {
        accrued: Vec<Balance>,
        wrapped_at: Option<usize>,
        error: Option<String>,
    },
    Scaling {
        samples: Vec<ScalingSample>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: usize,
    pub winner: Address,
    pub players: usize,
    pub prize: Balance,
    pub fee: Balance,
    pub total_fees: Balance,
    pub token_id: u64,
    pub rarity: Rarity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSample {
    pub roster_size: usize,
    pub pairwise: u64,
    pub indexed: u64,
}

impl Report {
    pub fn new(profile: Option<EngineProfile>, entrance_fee: Option<Balance>, body: ReportBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            profile,
            entrance_fee,
            body,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.body {
            ReportBody::Simulation { .. } => "simulation",
            ReportBody::Reentrancy { .. } => "reentrancy",
            ReportBody::Overflow { .. } => "overflow",
            ReportBody::Scaling { .. } => "scaling",
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.json",
            self.kind(),
            self.created_at.format("%Y%m%d-%H%M%S"),
            &self.id.simple().to_string()[..8]
        )
    }

    /// Write the report into `dir`, creating it if needed. Returns the path.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Saved {} report to {}", self.kind(), path.display());
        Ok(path)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a raffle report", path.display()))?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_report_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let report = Report::new(
            Some(EngineProfile::Audited),
            Some(1_000),
            ReportBody::Overflow {
                accrued: vec![800, 1_600, 2_400],
                wrapped_at: None,
                error: None,
            },
        );

        let path = report.save(&temp_dir.path().join("reports")).await.unwrap();
        assert!(path.ends_with(report.file_name()));

        let loaded = Report::load(&path).await.unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.kind(), "overflow");
        match loaded.body {
            ReportBody::Overflow { accrued, .. } => assert_eq!(accrued, vec![800, 1_600, 2_400]),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_json() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("other.json");
        tokio::fs::write(&path, r#"{"hello": "world"}"#).await.unwrap();

        let err = Report::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("not a raffle report"));
    }
}
