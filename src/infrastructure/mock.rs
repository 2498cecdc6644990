use crate::domain::errors::ProviderError;
use crate::domain::ports::{FeatureProvider, MarketDataProvider};
use crate::domain::types::{DailyBar, FeatureVector};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scriptable market-data provider for tests and dry runs.
///
/// With `available_through` set it refuses any query past that date, which
/// is how the causality tests prove the pipeline never reaches for a bar it
/// could not have had yet.
pub struct MockMarketData {
    bars: Mutex<HashMap<(String, NaiveDate), DailyBar>>,
    available_through: Option<NaiveDate>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            available_through: None,
        }
    }

    pub fn with_available_through(date: NaiveDate) -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            available_through: Some(date),
        }
    }

    pub fn add_bar(&self, ticker: &str, date: NaiveDate, open: Decimal, close: Decimal) {
        let bar = DailyBar {
            ticker: ticker.to_string(),
            date,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: Decimal::from(1_000_000),
        };
        self.bars
            .lock()
            .expect("mock bars mutex poisoned - concurrent panic")
            .insert((ticker.to_string(), date), bar);
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn daily_bar(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyBar>, ProviderError> {
        if let Some(limit) = self.available_through
            && date > limit
        {
            return Err(ProviderError::Unavailable {
                reason: format!("queried bar for {date}, history only available through {limit}"),
            });
        }
        Ok(self
            .bars
            .lock()
            .expect("mock bars mutex poisoned - concurrent panic")
            .get(&(ticker.to_string(), date))
            .cloned())
    }
}

/// Scriptable feature provider. Like the market mock, it rejects any request
/// for a date past `latest_available` to surface lookahead bugs.
pub struct MockFeatureProvider {
    batches: Mutex<HashMap<NaiveDate, Vec<FeatureVector>>>,
    latest_available: Option<NaiveDate>,
}

impl MockFeatureProvider {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            latest_available: None,
        }
    }

    pub fn with_latest_available(date: NaiveDate) -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            latest_available: Some(date),
        }
    }

    pub fn add_row(&self, row: FeatureVector) {
        self.batches
            .lock()
            .expect("mock features mutex poisoned - concurrent panic")
            .entry(row.as_of_date)
            .or_default()
            .push(row);
    }
}

impl Default for MockFeatureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureProvider for MockFeatureProvider {
    async fn feature_batch(
        &self,
        universe: &[String],
        as_of: NaiveDate,
    ) -> Result<Vec<FeatureVector>, ProviderError> {
        if let Some(limit) = self.latest_available
            && as_of > limit
        {
            return Err(ProviderError::Unavailable {
                reason: format!(
                    "queried features for {as_of}, only available through {limit}"
                ),
            });
        }
        Ok(self
            .batches
            .lock()
            .expect("mock features mutex poisoned - concurrent panic")
            .get(&as_of)
            .map(|rows| {
                rows.iter()
                    .filter(|row| universe.contains(&row.ticker))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
