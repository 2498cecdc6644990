use crate::application::simulator::TradeSimulator;
use crate::domain::calendar::TradingCalendar;
use crate::domain::costs::CostModel;
use crate::domain::ports::MarketDataProvider;
use crate::domain::repositories::SignalRepository;
use crate::domain::types::SignalStatus;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

/// Trading sessions a pending signal may wait for its trade-date bar before
/// it expires.
pub const DEFAULT_EXPIRY_SESSIONS: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub resolved_success: usize,
    pub resolved_fail: usize,
    pub expired: usize,
    pub still_pending: usize,
    pub skipped_non_trading: bool,
}

/// Advances live signals through `pending -> resolved/expired` as market
/// data arrives.
///
/// Resolution goes through the same settle routine as the backtester, so
/// live results stay comparable to backtested ones. Re-running over the same
/// window is a no-op: only pending signals are considered and the store
/// defends against double resolution.
pub struct LifecycleTracker {
    settler: TradeSimulator,
    calendar: TradingCalendar,
    expiry_sessions: u32,
}

impl LifecycleTracker {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        calendar: TradingCalendar,
        costs: CostModel,
        expiry_sessions: u32,
    ) -> Self {
        Self {
            settler: TradeSimulator::new(market_data, calendar.clone(), costs),
            calendar,
            expiry_sessions,
        }
    }

    pub async fn resolve_pending(
        &self,
        store: &dyn SignalRepository,
        today: NaiveDate,
    ) -> Result<ResolutionSummary> {
        let pending = store.pending_signals().context("reading pending signals")?;
        let mut summary = ResolutionSummary::default();

        if !self.calendar.is_trading_day(today) {
            info!(%today, pending = pending.len(), "non-trading day, leaving signals untouched");
            summary.still_pending = pending.len();
            summary.skipped_non_trading = true;
            return Ok(summary);
        }

        for signal in pending {
            let trade_date = self.calendar.next_session(signal.issue_date);
            if trade_date > today {
                summary.still_pending += 1;
                continue;
            }

            match self.settler.settle_signal(&signal).await? {
                Some(trade) => {
                    let status = if trade.is_surge {
                        SignalStatus::ResolvedSuccess
                    } else {
                        SignalStatus::ResolvedFail
                    };
                    store
                        .resolve_signal(signal.id, status, trade)
                        .with_context(|| format!("resolving signal {}", signal.id))?;
                    debug!(ticker = %signal.ticker, %status, "signal resolved");
                    match status {
                        SignalStatus::ResolvedSuccess => summary.resolved_success += 1,
                        _ => summary.resolved_fail += 1,
                    }
                }
                None => {
                    let waited = self.calendar.sessions_between(trade_date, today);
                    if waited >= self.expiry_sessions {
                        store
                            .expire_signal(signal.id)
                            .with_context(|| format!("expiring signal {}", signal.id))?;
                        info!(ticker = %signal.ticker, %trade_date, "signal expired, bar never materialized");
                        summary.expired += 1;
                    } else {
                        summary.still_pending += 1;
                    }
                }
            }
        }

        info!(
            resolved_success = summary.resolved_success,
            resolved_fail = summary.resolved_fail,
            expired = summary.expired,
            still_pending = summary.still_pending,
            "lifecycle pass complete"
        );
        Ok(summary)
    }
}
