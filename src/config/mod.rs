//! Configuration loading from environment variables.
//!
//! A `.env` file is honored when present; `Config::from_env` is the single
//! place the process reads its environment.

use crate::application::governor::GovernorConfig;
use crate::domain::calendar::TradingCalendar;
use crate::domain::costs::CostModel;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Provider
    pub provider_api_key: String,
    pub market_data_base_url: String,
    pub feature_base_url: String,

    // Engine
    pub artifact_dir: PathBuf,
    pub store_path: PathBuf,
    pub symbols: Vec<String>,
    pub holidays: Vec<NaiveDate>,
    pub expiry_sessions: u32,
    pub annualize_sharpe: bool,

    // Costs
    pub slippage_rate: Decimal,
    pub fee_rate: Decimal,
    pub surge_threshold: Decimal,

    // Rate governor
    pub rpm_limit: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let provider_api_key = env::var("PROVIDER_API_KEY")
            .context("PROVIDER_API_KEY must be set; the engine cannot run without it")?;
        if provider_api_key.trim().is_empty() {
            bail!("PROVIDER_API_KEY is set but empty");
        }

        let symbols: Vec<String> = env::var("SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            bail!("SYMBOLS must list at least one ticker (comma separated)");
        }

        let holidays = env::var("MARKET_HOLIDAYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .with_context(|| format!("invalid MARKET_HOLIDAYS entry '{s}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            provider_api_key,
            market_data_base_url: env::var("MARKET_DATA_BASE_URL")
                .unwrap_or_else(|_| "https://data.example-vendor.com".to_string()),
            feature_base_url: env::var("FEATURE_BASE_URL")
                .unwrap_or_else(|_| "https://features.example-vendor.com".to_string()),
            artifact_dir: PathBuf::from(
                env::var("ARTIFACT_DIR").unwrap_or_else(|_| "artifacts".to_string()),
            ),
            store_path: PathBuf::from(
                env::var("STORE_PATH").unwrap_or_else(|_| "data/signals.json".to_string()),
            ),
            symbols,
            holidays,
            expiry_sessions: parse_env("EXPIRY_SESSIONS", 5u32)?,
            annualize_sharpe: parse_env("ANNUALIZE_SHARPE", true)?,
            slippage_rate: parse_env("SLIPPAGE_RATE", Decimal::new(5, 3))?,
            fee_rate: parse_env("FEE_RATE", Decimal::new(1, 3))?,
            surge_threshold: parse_env("SURGE_THRESHOLD", Decimal::new(50, 2))?,
            rpm_limit: parse_env("RPM_LIMIT", 60u32)?,
            max_retries: parse_env("MAX_RETRIES", 5u32)?,
            base_delay_ms: parse_env("BASE_DELAY_MS", 500u64)?,
            max_jitter_ms: parse_env("MAX_JITTER_MS", 250u64)?,
        })
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_rate, self.fee_rate, self.surge_threshold)
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            rpm_limit: self.rpm_limit,
            window: Duration::from_secs(60),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }

    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::new(self.holidays.iter().copied())
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}='{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
