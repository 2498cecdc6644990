use crate::application::governor::RateGovernor;
use crate::domain::errors::ProviderError;
use crate::domain::ports::{FeatureProvider, MarketDataProvider};
use crate::domain::types::{DailyBar, FeatureVector};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::client_factory::build_url_with_query;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BARS_QUOTA_KEY: &str = "bars";
const FEATURES_QUOTA_KEY: &str = "features";

/// Bars are re-read within a run (issue close plus trade bar per signal);
/// a short TTL keeps repeats off the wire while still letting a backfilled
/// bar become visible on the next day's pass.
const BAR_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
struct BarDto {
    #[serde(rename = "o")]
    open: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "c")]
    close: Decimal,
    #[serde(rename = "v")]
    volume: Decimal,
}

impl BarDto {
    fn to_domain(&self, ticker: &str, date: NaiveDate) -> DailyBar {
        DailyBar {
            ticker: ticker.to_string(),
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: HashMap<String, Vec<BarDto>>,
}

#[derive(Debug, Deserialize)]
struct FeatureRowDto {
    ticker: String,
    features: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct FeatureBatchResponse {
    rows: Vec<FeatureRowDto>,
}

/// Daily-bar provider over the vendor's REST API.
///
/// Every request flows through the shared rate governor so bar and feature
/// traffic draw from the same per-key quota regardless of which component
/// triggered the call.
pub struct RestMarketDataProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    governor: Arc<RateGovernor>,
    bar_cache: TtlCache<(String, NaiveDate), Option<DailyBar>>,
}

impl RestMarketDataProvider {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: String,
        api_key: String,
        governor: Arc<RateGovernor>,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            governor,
            bar_cache: TtlCache::new(BAR_CACHE_TTL),
        }
    }

    async fn fetch_bar(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyBar>, ProviderError> {
        let date_param = date.to_string();
        let url = build_url_with_query(
            &format!("{}/v1/bars/daily", self.base_url),
            &[
                ("symbols", ticker),
                ("start", &date_param),
                ("end", &date_param),
            ],
        );

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable {
                reason: format!("bar request failed: {e}"),
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited {
                    key: BARS_QUOTA_KEY.to_string(),
                });
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Unavailable {
                    reason: format!("bar request returned {status}: {body}"),
                });
            }
            _ => {}
        }

        let parsed: BarsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Unavailable {
                    reason: format!("bar response undecodable: {e}"),
                })?;

        let bar = parsed
            .bars
            .get(ticker)
            .and_then(|bars| bars.first())
            .map(|dto| dto.to_domain(ticker, date));
        if bar.is_none() {
            debug!(%ticker, %date, "vendor has no bar");
        }
        Ok(bar)
    }
}

#[async_trait]
impl MarketDataProvider for RestMarketDataProvider {
    async fn daily_bar(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyBar>, ProviderError> {
        let key = (ticker.to_string(), date);
        if let Some(cached) = self.bar_cache.get(&key) {
            return Ok(cached);
        }
        let bar = self
            .governor
            .execute_with_backoff(BARS_QUOTA_KEY, || self.fetch_bar(ticker, date))
            .await?;
        self.bar_cache.insert(key, bar.clone());
        Ok(bar)
    }
}

/// Feature-batch provider over the feature service's REST API.
pub struct RestFeatureProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    governor: Arc<RateGovernor>,
}

impl RestFeatureProvider {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: String,
        api_key: String,
        governor: Arc<RateGovernor>,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            governor,
        }
    }

    async fn fetch_batch(
        &self,
        universe: &[String],
        as_of: NaiveDate,
    ) -> Result<Vec<FeatureVector>, ProviderError> {
        let symbols = universe.join(",");
        let as_of_param = as_of.to_string();
        let url = build_url_with_query(
            &format!("{}/v1/features/batch", self.base_url),
            &[("symbols", symbols.as_str()), ("as_of", &as_of_param)],
        );

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable {
                reason: format!("feature request failed: {e}"),
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited {
                    key: FEATURES_QUOTA_KEY.to_string(),
                });
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Unavailable {
                    reason: format!("feature request returned {status}: {body}"),
                });
            }
            _ => {}
        }

        let parsed: FeatureBatchResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Unavailable {
                    reason: format!("feature response undecodable: {e}"),
                })?;

        if parsed.rows.len() < universe.len() {
            warn!(
                requested = universe.len(),
                returned = parsed.rows.len(),
                %as_of,
                "feature service returned a partial batch"
            );
        }

        Ok(parsed
            .rows
            .into_iter()
            .map(|row| FeatureVector {
                ticker: row.ticker,
                as_of_date: as_of,
                features: row.features,
            })
            .collect())
    }
}

#[async_trait]
impl FeatureProvider for RestFeatureProvider {
    async fn feature_batch(
        &self,
        universe: &[String],
        as_of: NaiveDate,
    ) -> Result<Vec<FeatureVector>, ProviderError> {
        self.governor
            .execute_with_backoff(FEATURES_QUOTA_KEY, || self.fetch_batch(universe, as_of))
            .await
    }
}
