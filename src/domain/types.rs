use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// One daily OHLCV bar for a single ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Precomputed features for one (ticker, date) row, as delivered by the
/// feature provider. A feature absent from the map counts as missing.
///
/// Invariant: every value must be computable from data timestamped strictly
/// before `as_of_date`'s session close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub features: HashMap<String, f64>,
}

impl FeatureVector {
    /// Fraction of the declared feature columns present in this row.
    pub fn coverage(&self, declared: &[String]) -> f64 {
        if declared.is_empty() {
            return 0.0;
        }
        let present = declared
            .iter()
            .filter(|name| self.features.contains_key(name.as_str()))
            .count();
        present as f64 / declared.len() as f64
    }
}

/// Ensemble output for one row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub ticker: String,
    pub issue_date: NaiveDate,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Pending,
    ResolvedSuccess,
    ResolvedFail,
    Expired,
}

impl SignalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Pending => write!(f, "pending"),
            SignalStatus::ResolvedSuccess => write!(f, "resolved_success"),
            SignalStatus::ResolvedFail => write!(f, "resolved_fail"),
            SignalStatus::Expired => write!(f, "expired"),
        }
    }
}

/// An actionable surge signal issued by the gate. Status is advanced only by
/// the lifecycle tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub ticker: String,
    pub issue_date: NaiveDate,
    pub probability: f64,
    /// Threshold of the tier that admitted this signal (e.g. 0.95).
    pub tier: f64,
    pub status: SignalStatus,
}

impl Signal {
    pub fn new(ticker: String, issue_date: NaiveDate, probability: f64, tier: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker,
            issue_date,
            probability,
            tier,
            status: SignalStatus::Pending,
        }
    }
}

/// Result of settling one signal against its trade-date bar.
/// Produced by `CostModel::settle`; shared by the simulator and the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub gross_return: Decimal,
    pub net_return: Decimal,
    pub is_surge: bool,
}

/// Append-only trade history record. Prices always come from the trade-date
/// bar, never the issue-date bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub signal_id: Uuid,
    pub ticker: String,
    pub issue_date: NaiveDate,
    pub trade_date: NaiveDate,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub gross_return: Decimal,
    pub net_return: Decimal,
    pub is_surge: bool,
}

impl TradeRecord {
    pub fn from_outcome(signal: &Signal, trade_date: NaiveDate, outcome: &TradeOutcome) -> Self {
        Self {
            signal_id: signal.id,
            ticker: signal.ticker.clone(),
            issue_date: signal.issue_date,
            trade_date,
            buy_price: outcome.buy_price,
            sell_price: outcome.sell_price,
            gross_return: outcome.gross_return,
            net_return: outcome.net_return,
            is_surge: outcome.is_surge,
        }
    }
}
