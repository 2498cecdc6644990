use crate::domain::types::{Prediction, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// One probability cutoff bucket. The historical metadata travels with the
/// tier for reporting only; gating never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTier {
    pub threshold: f64,
    pub expected_win_rate: f64,
    pub expected_avg_return: f64,
}

/// Historical tier table from the trained universe. Ordered highest first.
pub const DEFAULT_TIERS: [ThresholdTier; 8] = [
    ThresholdTier { threshold: 0.95, expected_win_rate: 0.88, expected_avg_return: 0.62 },
    ThresholdTier { threshold: 0.90, expected_win_rate: 0.81, expected_avg_return: 0.48 },
    ThresholdTier { threshold: 0.85, expected_win_rate: 0.74, expected_avg_return: 0.39 },
    ThresholdTier { threshold: 0.80, expected_win_rate: 0.66, expected_avg_return: 0.31 },
    ThresholdTier { threshold: 0.75, expected_win_rate: 0.58, expected_avg_return: 0.24 },
    ThresholdTier { threshold: 0.70, expected_win_rate: 0.51, expected_avg_return: 0.18 },
    ThresholdTier { threshold: 0.60, expected_win_rate: 0.39, expected_avg_return: 0.09 },
    ThresholdTier { threshold: 0.50, expected_win_rate: 0.28, expected_avg_return: 0.03 },
];

/// Filters and ranks scored rows into actionable signals by threshold tier.
#[derive(Debug, Clone)]
pub struct SignalGate {
    tiers: Vec<ThresholdTier>,
}

impl SignalGate {
    /// `tiers` may arrive in any order; the gate keeps them descending.
    pub fn new(mut tiers: Vec<ThresholdTier>) -> Self {
        tiers.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Self { tiers }
    }

    pub fn with_default_tiers() -> Self {
        Self::new(DEFAULT_TIERS.to_vec())
    }

    pub fn tiers(&self) -> &[ThresholdTier] {
        &self.tiers
    }

    /// Highest tier whose threshold the probability meets or exceeds.
    pub fn tier_for(&self, probability: f64) -> Option<&ThresholdTier> {
        self.tiers.iter().find(|tier| probability >= tier.threshold)
    }

    /// Turn a scored batch into signals: at most one per (ticker, issue_date)
    /// keeping the highest probability (ties by lexicographic ticker), rows
    /// below the lowest tier dropped, output ordered probability descending
    /// with ticker ascending as tiebreak.
    pub fn gate(&self, predictions: &[Prediction]) -> Vec<Signal> {
        let mut best: HashMap<(chrono::NaiveDate, String), &Prediction> = HashMap::new();
        for pred in predictions {
            let key = (pred.issue_date, pred.ticker.clone());
            match best.get(&key) {
                Some(existing) if existing.probability >= pred.probability => {}
                _ => {
                    best.insert(key, pred);
                }
            }
        }

        let mut signals: Vec<Signal> = best
            .into_values()
            .filter_map(|pred| {
                self.tier_for(pred.probability).map(|tier| {
                    Signal::new(
                        pred.ticker.clone(),
                        pred.issue_date,
                        pred.probability,
                        tier.threshold,
                    )
                })
            })
            .collect();

        signals.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        if !signals.is_empty() {
            info!(
                issued = signals.len(),
                scored = predictions.len(),
                "gated signals"
            );
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn pred(ticker: &str, probability: f64) -> Prediction {
        Prediction {
            ticker: ticker.to_string(),
            issue_date: date("2024-04-01"),
            probability,
        }
    }

    fn test_gate() -> SignalGate {
        SignalGate::new(vec![
            ThresholdTier { threshold: 0.80, expected_win_rate: 0.6, expected_avg_return: 0.3 },
            ThresholdTier { threshold: 0.95, expected_win_rate: 0.9, expected_avg_return: 0.6 },
            ThresholdTier { threshold: 0.90, expected_win_rate: 0.8, expected_avg_return: 0.5 },
        ])
    }

    #[test]
    fn test_tier_assignment_is_deterministic() {
        let gate = test_gate();
        assert_eq!(gate.tier_for(0.97).unwrap().threshold, 0.95);
        assert_eq!(gate.tier_for(0.91).unwrap().threshold, 0.90);
        assert!(gate.tier_for(0.50).is_none());
        // Exact threshold qualifies
        assert_eq!(gate.tier_for(0.95).unwrap().threshold, 0.95);
    }

    #[test]
    fn test_tier_assignment_independent_of_input_order() {
        let gate = test_gate();
        let forward = vec![pred("AAAA", 0.97), pred("BBBB", 0.91), pred("CCCC", 0.50)];
        let reversed: Vec<Prediction> = forward.iter().rev().cloned().collect();

        let a = gate.gate(&forward);
        let b = gate.gate(&reversed);

        let tiers_a: Vec<f64> = a.iter().map(|s| s.tier).collect();
        let tiers_b: Vec<f64> = b.iter().map(|s| s.tier).collect();
        assert_eq!(tiers_a, vec![0.95, 0.90]);
        assert_eq!(tiers_a, tiers_b);
    }

    #[test]
    fn test_duplicate_rows_keep_highest_probability() {
        let gate = test_gate();
        let signals = gate.gate(&[pred("AAAA", 0.85), pred("AAAA", 0.96), pred("AAAA", 0.91)]);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].probability, 0.96);
        assert_eq!(signals[0].tier, 0.95);
    }

    #[test]
    fn test_output_ordering_probability_desc_then_ticker() {
        let gate = test_gate();
        let signals = gate.gate(&[
            pred("ZZZZ", 0.91),
            pred("AAAA", 0.91),
            pred("MMMM", 0.97),
        ]);
        let order: Vec<&str> = signals.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(order, vec!["MMMM", "AAAA", "ZZZZ"]);
    }

    #[test]
    fn test_below_lowest_tier_produces_no_signal() {
        let gate = SignalGate::with_default_tiers();
        assert!(gate.gate(&[pred("AAAA", 0.49)]).is_empty());
        assert_eq!(gate.gate(&[pred("AAAA", 0.50)]).len(), 1);
    }
}
