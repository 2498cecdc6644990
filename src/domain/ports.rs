use crate::domain::errors::ProviderError;
use crate::domain::types::{DailyBar, FeatureVector};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Access to daily bars from an external market-data vendor.
///
/// `Ok(None)` means the vendor has no bar for that (ticker, date) — a halted
/// or delisted instrument, not a failure.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn daily_bar(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyBar>, ProviderError>;

    async fn daily_close(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, ProviderError> {
        Ok(self.daily_bar(ticker, date).await?.map(|bar| bar.close))
    }
}

/// External feature-engineering service. The engine never derives indicator
/// columns itself; it only consumes rows honoring the causality contract
/// (nothing in a row may be timestamped at or after `as_of`'s close).
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    async fn feature_batch(
        &self,
        universe: &[String],
        as_of: NaiveDate,
    ) -> Result<Vec<FeatureVector>, ProviderError>;
}
