use crate::domain::fee::FeePolicy;
use crate::domain::money::Amount;
use crate::error::{LedgerError, Result};
use crate::telemetry::LogFormat;
use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunables of the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Flat penalty charged when an account goes negative.
    pub overdraft_fee: Decimal,
    /// Most `courant` accounts a single client may hold.
    pub max_current_accounts: usize,
    pub fee_policy: FeePolicy,
    /// Period of the background credit and fee sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overdraft_fee: dec!(5.00),
            max_current_accounts: 2,
            fee_policy: FeePolicy::Permanent,
            sweep_interval_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn overdraft_fee(&self) -> Result<Amount> {
        Amount::new(self.overdraft_fee)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        self.overdraft_fee()?;
        if self.max_current_accounts == 0 {
            return Err(LedgerError::ValidationError(
                "max_current_accounts must be at least 1".to_string(),
            ));
        }
        if let FeePolicy::Rolling { window_days: 0 } = self.fee_policy {
            return Err(LedgerError::ValidationError(
                "a rolling fee window must span at least one day".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replays a JSON-lines command journal against the back office and prints
/// the resulting account statement as CSV.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input command journal (one JSON object per line)
    #[arg(env = "BANK_LEDGER_INPUT")]
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "BANK_LEDGER_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Business date the journal starts on (defaults to the current date)
    #[arg(long, env = "BANK_LEDGER_TODAY")]
    pub today: Option<NaiveDate>,

    /// Flat overdraft penalty
    #[arg(long, env = "BANK_LEDGER_OVERDRAFT_FEE")]
    pub overdraft_fee: Option<Decimal>,

    /// Re-allow an overdraft fee this many days after the previous one
    /// instead of charging only once per account
    #[arg(long, env = "BANK_LEDGER_FEE_WINDOW_DAYS")]
    pub fee_window_days: Option<u32>,

    /// Most current accounts a client may hold
    #[arg(long, env = "BANK_LEDGER_MAX_CURRENT_ACCOUNTS")]
    pub max_current_accounts: Option<usize>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "BANK_LEDGER_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(fee) = self.overdraft_fee {
            config.overdraft_fee = fee;
        }
        if let Some(window_days) = self.fee_window_days {
            config.fee_policy = FeePolicy::Rolling { window_days };
        }
        if let Some(max) = self.max_current_accounts {
            config.max_current_accounts = max;
        }
        config
    }
}
