use raffle_engine::{Balance, EngineProfile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One ether in wei; the default entrance fee.
pub const DEFAULT_ENTRANCE_FEE: Balance = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub default_profile: EngineProfile,
    pub entrance_fee: Balance,
    pub raffle_duration_secs: i64,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("raffle"),
            default_profile: EngineProfile::Hardened,
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            raffle_duration_secs: 86_400,
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, verbose: bool) -> Self {
        let mut config = Self::default();
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        config.verbose = verbose;
        config
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    pub fn raffle_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.raffle_duration_secs)
    }
}
