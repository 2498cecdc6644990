use crate::domain::types::{DailyBar, TradeOutcome};
use rust_decimal::Decimal;

/// Two-sided execution cost model shared by the backtester and the lifecycle
/// tracker, so live resolutions stay comparable to backtested ones.
///
/// Slippage is embedded in the price legs; the fee is charged once per leg on
/// top of the gross return. Nothing else may subtract costs again downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Symmetric price disadvantage per leg, e.g. 0.005 for 0.5%.
    pub slippage_rate: Decimal,
    /// Fee per leg, e.g. 0.001 for 0.1%. Applied twice (entry + exit).
    pub fee_rate: Decimal,
    /// Next-session close-over-close gain that counts as a surge, e.g. 0.50.
    pub surge_threshold: Decimal,
}

impl CostModel {
    pub fn new(slippage_rate: Decimal, fee_rate: Decimal, surge_threshold: Decimal) -> Self {
        Self {
            slippage_rate,
            fee_rate,
            surge_threshold,
        }
    }

    /// Settle one signal against its trade-date bar.
    ///
    /// `issue_close` is the close of the issue-date session; the surge label
    /// compares trade-date close against it and ignores the cost model.
    /// Returns `None` when prices are degenerate (non-positive open/close).
    pub fn settle(&self, issue_close: Decimal, bar: &DailyBar) -> Option<TradeOutcome> {
        if bar.open <= Decimal::ZERO || bar.close <= Decimal::ZERO || issue_close <= Decimal::ZERO {
            return None;
        }

        let buy_price = bar.open * (Decimal::ONE + self.slippage_rate);
        let sell_price = bar.close * (Decimal::ONE - self.slippage_rate);

        let gross_return = sell_price.checked_div(buy_price)? - Decimal::ONE;
        let net_return = gross_return - Decimal::TWO * self.fee_rate;

        let raw_gain = bar.close.checked_div(issue_close)? - Decimal::ONE;
        let is_surge = raw_gain >= self.surge_threshold;

        Some(TradeOutcome {
            buy_price,
            sell_price,
            gross_return,
            net_return,
            is_surge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, close: Decimal) -> DailyBar {
        DailyBar {
            ticker: "TEST".to_string(),
            date: NaiveDate::parse_from_str("2024-04-02", "%Y-%m-%d").unwrap(),
            open,
            high: close.max(open),
            low: open.min(close),
            close,
            volume: dec!(1_000_000),
        }
    }

    #[test]
    fn test_cost_model_round_trip() {
        // open=1.00, close=1.60, slippage=0.005, fee=0.001
        let model = CostModel::new(dec!(0.005), dec!(0.001), dec!(0.50));
        let outcome = model.settle(dec!(1.00), &bar(dec!(1.00), dec!(1.60))).unwrap();

        assert_eq!(outcome.buy_price, dec!(1.005));
        assert_eq!(outcome.sell_price, dec!(1.592));
        // gross ~ 58.41%, net = gross - 0.2%
        assert!((outcome.gross_return - dec!(0.5841)).abs() < dec!(0.0001));
        assert!((outcome.net_return - dec!(0.5821)).abs() < dec!(0.0001));
        assert_eq!(outcome.net_return, outcome.gross_return - dec!(0.002));
        assert!(outcome.is_surge); // 60% close-over-close
    }

    #[test]
    fn test_surge_label_independent_of_costs() {
        // Heavy costs, but the raw close/close gain still clears 50%
        let model = CostModel::new(dec!(0.05), dec!(0.05), dec!(0.50));
        let outcome = model.settle(dec!(0.10), &bar(dec!(0.10), dec!(0.16))).unwrap();
        assert!(outcome.is_surge);

        // Gain of 49.9% misses the threshold
        let outcome = model
            .settle(dec!(1.000), &bar(dec!(1.000), dec!(1.499)))
            .unwrap();
        assert!(!outcome.is_surge);
    }

    #[test]
    fn test_penny_stock_scenario() {
        // Tier-0.95 signal scenario: open=0.10, close=0.16
        let model = CostModel::new(dec!(0.005), dec!(0.001), dec!(0.50));
        let outcome = model.settle(dec!(0.10), &bar(dec!(0.10), dec!(0.16))).unwrap();

        assert!((outcome.net_return - dec!(0.582)).abs() < dec!(0.0005));
        assert!(outcome.is_surge);
    }

    #[test]
    fn test_degenerate_prices_rejected() {
        let model = CostModel::new(dec!(0.005), dec!(0.001), dec!(0.50));
        assert!(model.settle(dec!(1.0), &bar(Decimal::ZERO, dec!(1.0))).is_none());
        assert!(model.settle(Decimal::ZERO, &bar(dec!(1.0), dec!(1.0))).is_none());
    }
}
