use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Shared statistics utilities for trade-return series.
///
/// All path-dependent computations (drawdown, streaks) assume the input is
/// already ordered by trade date ascending; callers own that sort.
pub struct Stats;

impl Stats {
    pub fn mean(returns: &[Decimal]) -> Decimal {
        if returns.is_empty() {
            return Decimal::ZERO;
        }
        returns.iter().sum::<Decimal>() / Decimal::from(returns.len())
    }

    pub fn median(returns: &[Decimal]) -> Decimal {
        if returns.is_empty() {
            return Decimal::ZERO;
        }
        let mut sorted = returns.to_vec();
        sorted.sort();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
        } else {
            sorted[mid]
        }
    }

    /// Sharpe-like ratio: mean(returns) / sample stdev(returns).
    ///
    /// `annualize` multiplies by sqrt(252); trades are not daily-spaced, so
    /// reports must state whether the factor was applied.
    pub fn sharpe_ratio(returns: &[Decimal], annualize: bool) -> Decimal {
        if returns.len() < 2 {
            return Decimal::ZERO;
        }

        let mean_return = Self::mean(returns);

        // Sample variance (n-1)
        let mut variance_sum = Decimal::ZERO;
        for r in returns {
            let diff = r - mean_return;
            variance_sum += diff * diff;
        }
        let variance = variance_sum / Decimal::from(returns.len() - 1);

        let std_dev_f64 = rust_decimal::prelude::ToPrimitive::to_f64(&variance)
            .unwrap_or(0.0)
            .sqrt();
        let std_dev = Decimal::from_f64_retain(std_dev_f64).unwrap_or(Decimal::ZERO);

        if std_dev > dec!(1e-9) {
            let ratio = mean_return / std_dev;
            if annualize {
                let sqrt_252 =
                    Decimal::from_f64_retain(15.874507866387544).unwrap_or(Decimal::ZERO);
                ratio * sqrt_252
            } else {
                ratio
            }
        } else {
            Decimal::ZERO
        }
    }

    /// Maximum drawdown of the compounded equity curve.
    ///
    /// Equity is the cumulative product of (1 + r); drawdown at step i is
    /// equity[i] / running_max(equity[..=i]) - 1. The result is <= 0, with 0
    /// meaning the curve never fell below a prior peak.
    pub fn max_drawdown(returns: &[Decimal]) -> Decimal {
        let mut equity = Decimal::ONE;
        let mut running_max = Decimal::ONE;
        let mut worst = Decimal::ZERO;

        for r in returns {
            equity *= Decimal::ONE + r;
            if equity > running_max {
                running_max = equity;
            }
            let drawdown = equity
                .checked_div(running_max)
                .map(|q| q - Decimal::ONE)
                .unwrap_or(Decimal::ZERO);
            if drawdown < worst {
                worst = drawdown;
            }
        }
        worst
    }

    /// Longest and average run length of contiguous losing trades (r < 0).
    pub fn loss_streaks(returns: &[Decimal]) -> (usize, Decimal) {
        let mut longest = 0usize;
        let mut current = 0usize;
        let mut runs: Vec<usize> = Vec::new();

        for r in returns {
            if *r < Decimal::ZERO {
                current += 1;
            } else {
                if current > 0 {
                    runs.push(current);
                }
                current = 0;
            }
            longest = longest.max(current);
        }
        if current > 0 {
            runs.push(current);
        }

        let average = if runs.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(runs.iter().sum::<usize>()) / Decimal::from(runs.len())
        };
        (longest, average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharpe_ratio() {
        let returns = vec![dec!(0.01), dec!(0.02), dec!(0.01), dec!(0.02)];
        let sharpe = Stats::sharpe_ratio(&returns, false);
        assert!(sharpe > Decimal::ZERO);

        // Zero variance -> zero ratio
        let flat = vec![dec!(0.01), dec!(0.01), dec!(0.01)];
        assert_eq!(Stats::sharpe_ratio(&flat, false), Decimal::ZERO);

        // Annualization scales by sqrt(252)
        let annualized = Stats::sharpe_ratio(&returns, true);
        assert!(annualized > sharpe * dec!(15.8));
        assert!(annualized < sharpe * dec!(15.9));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(Stats::median(&[dec!(0.3), dec!(0.1), dec!(0.2)]), dec!(0.2));
        assert_eq!(
            Stats::median(&[dec!(0.4), dec!(0.1), dec!(0.2), dec!(0.3)]),
            dec!(0.25)
        );
        assert_eq!(Stats::median(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_max_drawdown_known_sequence() {
        // Equity: 1.10, 0.88, 0.968 -> trough 0.88 against peak 1.10 = -20%
        let returns = vec![dec!(0.10), dec!(-0.20), dec!(0.10)];
        let dd = Stats::max_drawdown(&returns);
        assert_eq!(dd, dec!(-0.20));
    }

    #[test]
    fn test_drawdown_monotonicity_property() {
        // running_max never decreases and drawdown stays <= 0 at each step
        let returns = vec![
            dec!(0.05),
            dec!(-0.10),
            dec!(0.20),
            dec!(-0.30),
            dec!(0.01),
            dec!(0.50),
        ];
        let mut equity = Decimal::ONE;
        let mut running_max = Decimal::ONE;
        for r in &returns {
            equity *= Decimal::ONE + r;
            let prev_max = running_max;
            if equity > running_max {
                running_max = equity;
            }
            assert!(running_max >= prev_max);
            let drawdown = equity / running_max - Decimal::ONE;
            assert!(drawdown <= Decimal::ZERO);
        }
        assert!(Stats::max_drawdown(&returns) <= Decimal::ZERO);
        // All-gain sequences never draw down
        assert_eq!(Stats::max_drawdown(&[dec!(0.1), dec!(0.2)]), Decimal::ZERO);
    }

    #[test]
    fn test_loss_streaks() {
        let returns = vec![
            dec!(-0.1),
            dec!(-0.1),
            dec!(0.2),
            dec!(-0.1),
            dec!(-0.1),
            dec!(-0.1),
            dec!(0.3),
        ];
        let (longest, average) = Stats::loss_streaks(&returns);
        assert_eq!(longest, 3);
        assert_eq!(average, dec!(2.5));

        let (longest, average) = Stats::loss_streaks(&[dec!(0.1)]);
        assert_eq!(longest, 0);
        assert_eq!(average, Decimal::ZERO);

        // Trailing streak is counted
        let (longest, _) = Stats::loss_streaks(&[dec!(0.1), dec!(-0.1), dec!(-0.2)]);
        assert_eq!(longest, 2);
    }
}
