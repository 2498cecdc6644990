use crate::domain::performance::stats::Stats;
use crate::domain::types::TradeRecord;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the aggregate strategy return is reported.
///
/// The source analyses mixed these two up; they are deliberately separate
/// fields here and callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnMode {
    /// Each trade against fixed capital; total is the sum of net returns.
    IndependentTrade,
    /// Cumulative reinvestment; total is prod(1 + net) - 1.
    Compounding,
}

/// Aggregated realized performance over a trade collection.
///
/// A pure projection: recomputed on demand, never independently mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_signals: usize,
    pub resolved_count: usize,
    pub win_rate: Decimal,
    pub avg_return: Decimal,
    pub median_return: Decimal,
    pub total_return_independent: Decimal,
    pub total_return_compounded: Decimal,
    pub max_drawdown: Decimal,
    pub longest_loss_streak: usize,
    pub avg_loss_streak: Decimal,
    pub sharpe_like_ratio: Decimal,
    /// Whether `sharpe_like_ratio` was multiplied by sqrt(252). Trades are
    /// not daily-spaced, so the factor must be reported, not assumed.
    pub sharpe_annualized: bool,
    pub generated_at: DateTime<Utc>,
}

impl PerformanceSnapshot {
    /// Project a snapshot from trade history. Sorts by trade date ascending
    /// before any path-dependent statistic is computed.
    pub fn from_trades(trades: &[TradeRecord], total_signals: usize, annualize: bool) -> Self {
        let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
        ordered.sort_by(|a, b| {
            a.trade_date
                .cmp(&b.trade_date)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let returns: Vec<Decimal> = ordered.iter().map(|t| t.net_return).collect();
        let wins = returns.iter().filter(|r| **r > Decimal::ZERO).count();
        let win_rate = if returns.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(wins) / Decimal::from(returns.len())
        };

        let total_return_independent = returns.iter().sum::<Decimal>();
        let total_return_compounded = returns
            .iter()
            .fold(Decimal::ONE, |acc, r| acc * (Decimal::ONE + r))
            - Decimal::ONE;

        let (longest_loss_streak, avg_loss_streak) = Stats::loss_streaks(&returns);

        Self {
            total_signals,
            resolved_count: returns.len(),
            win_rate,
            avg_return: Stats::mean(&returns),
            median_return: Stats::median(&returns),
            total_return_independent,
            total_return_compounded,
            max_drawdown: Stats::max_drawdown(&returns),
            longest_loss_streak,
            avg_loss_streak,
            sharpe_like_ratio: Stats::sharpe_ratio(&returns, annualize),
            sharpe_annualized: annualize,
            generated_at: Utc::now(),
        }
    }

    pub fn total_return(&self, mode: ReturnMode) -> Decimal {
        match mode {
            ReturnMode::IndependentTrade => self.total_return_independent,
            ReturnMode::Compounding => self.total_return_compounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn trade(trade_date: &str, net: Decimal) -> TradeRecord {
        TradeRecord {
            signal_id: Uuid::new_v4(),
            ticker: "TEST".to_string(),
            issue_date: date("2024-04-01"),
            trade_date: date(trade_date),
            buy_price: dec!(1.0),
            sell_price: dec!(1.0) + net,
            gross_return: net + dec!(0.002),
            net_return: net,
            is_surge: net > dec!(0.5),
        }
    }

    #[test]
    fn test_snapshot_basic_aggregates() {
        let trades = vec![
            trade("2024-04-02", dec!(0.50)),
            trade("2024-04-03", dec!(-0.10)),
            trade("2024-04-04", dec!(0.20)),
            trade("2024-04-05", dec!(-0.05)),
        ];
        let snap = PerformanceSnapshot::from_trades(&trades, 6, false);

        assert_eq!(snap.total_signals, 6);
        assert_eq!(snap.resolved_count, 4);
        assert_eq!(snap.win_rate, dec!(0.5));
        assert_eq!(snap.total_return_independent, dec!(0.55));
        // 1.5 * 0.9 * 1.2 * 0.95 - 1 = 0.539
        assert_eq!(snap.total_return_compounded, dec!(0.539));
        assert_eq!(snap.longest_loss_streak, 1);
        assert!(!snap.sharpe_annualized);
    }

    #[test]
    fn test_modes_are_reported_separately() {
        let trades = vec![
            trade("2024-04-02", dec!(0.10)),
            trade("2024-04-03", dec!(0.10)),
        ];
        let snap = PerformanceSnapshot::from_trades(&trades, 2, false);
        assert_eq!(snap.total_return(ReturnMode::IndependentTrade), dec!(0.20));
        assert_eq!(snap.total_return(ReturnMode::Compounding), dec!(0.21));
    }

    #[test]
    fn test_snapshot_sorts_by_trade_date_before_path_stats() {
        // Delivered out of order: the loss streak only exists in date order
        let trades = vec![
            trade("2024-04-05", dec!(0.30)),
            trade("2024-04-03", dec!(-0.10)),
            trade("2024-04-02", dec!(0.10)),
            trade("2024-04-04", dec!(-0.10)),
        ];
        let snap = PerformanceSnapshot::from_trades(&trades, 4, false);
        assert_eq!(snap.longest_loss_streak, 2);
    }

    #[test]
    fn test_empty_trades() {
        let snap = PerformanceSnapshot::from_trades(&[], 3, true);
        assert_eq!(snap.resolved_count, 0);
        assert_eq!(snap.win_rate, Decimal::ZERO);
        assert_eq!(snap.max_drawdown, Decimal::ZERO);
        assert_eq!(snap.total_return_compounded, Decimal::ZERO);
    }
}
