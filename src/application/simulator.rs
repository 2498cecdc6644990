use crate::domain::calendar::TradingCalendar;
use crate::domain::costs::CostModel;
use crate::domain::performance::PerformanceSnapshot;
use crate::domain::ports::MarketDataProvider;
use crate::domain::types::{Signal, TradeRecord};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of replaying a signal set through the cost model.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    /// Settled trades, ordered by trade date ascending.
    pub trades: Vec<TradeRecord>,
    /// Signals without a usable trade-date bar. Excluded, not losses.
    pub excluded: usize,
    pub snapshot: PerformanceSnapshot,
}

impl BacktestReport {
    /// Per-tier snapshots over the same trade vector; no re-simulation.
    pub fn snapshots_by_tier(
        &self,
        signals: &[Signal],
        annualize: bool,
    ) -> Vec<(f64, PerformanceSnapshot)> {
        snapshots_by_tier(signals, &self.trades, annualize)
    }
}

/// Group trades by the tier of their originating signal and project one
/// snapshot per tier, highest tier first.
pub fn snapshots_by_tier(
    signals: &[Signal],
    trades: &[TradeRecord],
    annualize: bool,
) -> Vec<(f64, PerformanceSnapshot)> {
    // Decimal-scaled key keeps f64 tiers groupable without float-key maps
    let mut grouped: BTreeMap<i64, (f64, Vec<TradeRecord>, usize)> = BTreeMap::new();
    for signal in signals {
        let key = (signal.tier * 10_000.0).round() as i64;
        let entry = grouped.entry(key).or_insert((signal.tier, Vec::new(), 0));
        entry.2 += 1;
        if let Some(trade) = trades.iter().find(|t| t.signal_id == signal.id) {
            entry.1.push(trade.clone());
        }
    }
    grouped
        .into_values()
        .rev()
        .map(|(tier, tier_trades, total)| {
            (
                tier,
                PerformanceSnapshot::from_trades(&tier_trades, total, annualize),
            )
        })
        .collect()
}

/// Replays historical signals through the shared cost model under strict
/// walk-forward discipline: each trade uses only the bar of the session
/// after its issue date, and aggregation happens in trade-date order.
pub struct TradeSimulator {
    market_data: Arc<dyn MarketDataProvider>,
    calendar: TradingCalendar,
    costs: CostModel,
}

impl TradeSimulator {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        calendar: TradingCalendar,
        costs: CostModel,
    ) -> Self {
        Self {
            market_data,
            calendar,
            costs,
        }
    }

    /// Settle one signal: locate the next-session bar and apply the cost
    /// model. `Ok(None)` when the bar or the issue-date close is missing.
    pub async fn settle_signal(&self, signal: &Signal) -> Result<Option<TradeRecord>> {
        let trade_date = self.calendar.next_session(signal.issue_date);

        let Some(bar) = self.market_data.daily_bar(&signal.ticker, trade_date).await? else {
            debug!(ticker = %signal.ticker, %trade_date, "no trade-date bar, excluding");
            return Ok(None);
        };
        let Some(issue_close) = self
            .market_data
            .daily_close(&signal.ticker, signal.issue_date)
            .await?
        else {
            debug!(ticker = %signal.ticker, issue_date = %signal.issue_date, "no issue-date close, excluding");
            return Ok(None);
        };

        Ok(self
            .costs
            .settle(issue_close, &bar)
            .map(|outcome| TradeRecord::from_outcome(signal, trade_date, &outcome)))
    }

    pub async fn replay(&self, signals: &[Signal], annualize: bool) -> Result<BacktestReport> {
        let mut trades = Vec::with_capacity(signals.len());
        let mut excluded = 0;

        for signal in signals {
            match self.settle_signal(signal).await? {
                Some(trade) => trades.push(trade),
                None => excluded += 1,
            }
        }

        trades.sort_by(|a, b| {
            a.trade_date
                .cmp(&b.trade_date)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let snapshot = PerformanceSnapshot::from_trades(&trades, signals.len(), annualize);
        info!(
            signals = signals.len(),
            settled = trades.len(),
            excluded,
            win_rate = %snapshot.win_rate,
            "backtest replay complete"
        );

        Ok(BacktestReport {
            trades,
            excluded,
            snapshot,
        })
    }
}
