use crate::application::gate::SignalGate;
use crate::application::scoring::EnsembleScorer;
use crate::application::tracker::LifecycleTracker;
use crate::domain::calendar::TradingCalendar;
use crate::domain::errors::StoreError;
use crate::domain::performance::PerformanceSnapshot;
use crate::domain::ports::FeatureProvider;
use crate::domain::repositories::SignalRepository;
use crate::domain::types::{Signal, TradeRecord};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: &'static str,
    pub status: StepStatus,
    pub detail: String,
}

/// Outcome of one daily run: per-step results for the operator report.
#[derive(Debug, Clone)]
pub struct DailyRunReport {
    pub date: NaiveDate,
    pub skipped_non_trading: bool,
    pub already_completed: bool,
    pub steps: Vec<StepOutcome>,
    pub snapshot: Option<PerformanceSnapshot>,
    pub new_signals: usize,
}

impl DailyRunReport {
    fn skipped(date: NaiveDate, already_completed: bool) -> Self {
        Self {
            date,
            skipped_non_trading: !already_completed,
            already_completed,
            steps: Vec::new(),
            snapshot: None,
            new_signals: 0,
        }
    }

    pub fn all_steps_completed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }
}

/// Sequences the daily pipeline: resolve, report, generate, verify.
///
/// Each step's failure is logged and the remaining steps still run, except
/// that signal generation requires valid loaded model artifacts; without
/// them it fails without fabricating signals. The whole sequence is skipped
/// on non-trading days, and a completed-run marker makes a second same-day
/// invocation a no-op.
pub struct DailyOrchestrator {
    calendar: TradingCalendar,
    tracker: LifecycleTracker,
    scorer: Option<EnsembleScorer>,
    gate: SignalGate,
    feature_provider: Arc<dyn FeatureProvider>,
    store: Arc<dyn SignalRepository>,
    annualize_sharpe: bool,
}

impl DailyOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calendar: TradingCalendar,
        tracker: LifecycleTracker,
        scorer: Option<EnsembleScorer>,
        gate: SignalGate,
        feature_provider: Arc<dyn FeatureProvider>,
        store: Arc<dyn SignalRepository>,
        annualize_sharpe: bool,
    ) -> Self {
        Self {
            calendar,
            tracker,
            scorer,
            gate,
            feature_provider,
            store,
            annualize_sharpe,
        }
    }

    pub async fn run(&self, today: NaiveDate, universe: &[String]) -> DailyRunReport {
        if !self.calendar.is_trading_day(today) {
            info!(%today, "non-trading day, daily sequence skipped");
            return DailyRunReport::skipped(today, false);
        }
        match self.store.run_completed(today) {
            Ok(true) => {
                info!(%today, "daily run already verified complete, nothing to do");
                return DailyRunReport::skipped(today, true);
            }
            Ok(false) => {}
            Err(e) => warn!(%today, error = %e, "could not read run marker, proceeding"),
        }

        let mut report = DailyRunReport {
            date: today,
            skipped_non_trading: false,
            already_completed: false,
            steps: Vec::new(),
            snapshot: None,
            new_signals: 0,
        };

        self.step_resolve(today, &mut report).await;
        self.step_report(&mut report);
        self.step_generate(today, universe, &mut report).await;
        self.step_verify(today, &mut report);

        report
    }

    async fn step_resolve(&self, today: NaiveDate, report: &mut DailyRunReport) {
        let outcome = match self.tracker.resolve_pending(self.store.as_ref(), today).await {
            Ok(summary) => StepOutcome {
                name: "resolve",
                status: StepStatus::Completed,
                detail: format!(
                    "success={} fail={} expired={} pending={}",
                    summary.resolved_success,
                    summary.resolved_fail,
                    summary.expired,
                    summary.still_pending
                ),
            },
            Err(e) => {
                error!(error = %e, "signal resolution step failed");
                StepOutcome {
                    name: "resolve",
                    status: StepStatus::Failed,
                    detail: e.to_string(),
                }
            }
        };
        report.steps.push(outcome);
    }

    fn step_report(&self, report: &mut DailyRunReport) {
        let outcome = match (self.store.trades(), self.store.all_signals()) {
            (Ok(trades), Ok(signals)) => {
                let snapshot = PerformanceSnapshot::from_trades(
                    &trades,
                    signals.len(),
                    self.annualize_sharpe,
                );
                info!(
                    total_signals = snapshot.total_signals,
                    resolved = snapshot.resolved_count,
                    win_rate = %snapshot.win_rate,
                    max_drawdown = %snapshot.max_drawdown,
                    sharpe = %snapshot.sharpe_like_ratio,
                    "performance snapshot"
                );
                let detail = format!(
                    "resolved={} win_rate={}",
                    snapshot.resolved_count, snapshot.win_rate
                );
                report.snapshot = Some(snapshot);
                StepOutcome {
                    name: "report",
                    status: StepStatus::Completed,
                    detail,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "performance report step failed");
                StepOutcome {
                    name: "report",
                    status: StepStatus::Failed,
                    detail: e.to_string(),
                }
            }
        };
        report.steps.push(outcome);
    }

    async fn step_generate(
        &self,
        today: NaiveDate,
        universe: &[String],
        report: &mut DailyRunReport,
    ) {
        let outcome = match &self.scorer {
            None => {
                error!("model artifacts unavailable, no signals generated");
                StepOutcome {
                    name: "generate",
                    status: StepStatus::Failed,
                    detail: "model artifacts unavailable".to_string(),
                }
            }
            Some(scorer) => match self.generate_signals(scorer, today, universe).await {
                Ok(inserted) => {
                    report.new_signals = inserted;
                    StepOutcome {
                        name: "generate",
                        status: StepStatus::Completed,
                        detail: format!("issued={inserted}"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "signal generation step failed");
                    StepOutcome {
                        name: "generate",
                        status: StepStatus::Failed,
                        detail: e.to_string(),
                    }
                }
            },
        };
        report.steps.push(outcome);
    }

    async fn generate_signals(
        &self,
        scorer: &EnsembleScorer,
        today: NaiveDate,
        universe: &[String],
    ) -> anyhow::Result<usize> {
        let batch = self.feature_provider.feature_batch(universe, today).await?;
        let scored = scorer.score_batch(&batch)?;
        if !scored.skipped.is_empty() {
            warn!(
                excluded = scored.skipped.len(),
                "rows excluded for insufficient features"
            );
        }
        let signals = self.gate.gate(&scored.predictions);
        let inserted = self.store.insert_signals(&signals)?;
        info!(
            universe = universe.len(),
            scored = scored.predictions.len(),
            issued = signals.len(),
            inserted,
            "signal generation complete"
        );
        Ok(inserted)
    }

    fn step_verify(&self, today: NaiveDate, report: &mut DailyRunReport) {
        let outcome = match (self.store.all_signals(), self.store.trades()) {
            (Ok(signals), Ok(trades)) => match verify_consistency(&signals, &trades) {
                Ok(()) => {
                    let completed = report
                        .steps
                        .iter()
                        .all(|s| s.status == StepStatus::Completed);
                    // Only a fully successful run is marked complete, so a
                    // same-day retry can still repair a failed step.
                    if completed {
                        if let Err(e) = self.store.mark_run_completed(today) {
                            warn!(error = %e, "could not persist run marker");
                        }
                    }
                    StepOutcome {
                        name: "verify",
                        status: StepStatus::Completed,
                        detail: format!(
                            "signals={} trades={} consistent",
                            signals.len(),
                            trades.len()
                        ),
                    }
                }
                Err(e) => {
                    error!(error = %e, "persisted state inconsistent");
                    StepOutcome {
                        name: "verify",
                        status: StepStatus::Failed,
                        detail: e.to_string(),
                    }
                }
            },
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "verification step failed");
                StepOutcome {
                    name: "verify",
                    status: StepStatus::Failed,
                    detail: e.to_string(),
                }
            }
        };
        report.steps.push(outcome);
    }
}

/// Self-consistency rules for the persisted book: every resolved signal has
/// exactly one trade, pending/expired signals have none.
fn verify_consistency(signals: &[Signal], trades: &[TradeRecord]) -> Result<(), StoreError> {
    use crate::domain::types::SignalStatus;

    let resolved = signals
        .iter()
        .filter(|s| {
            matches!(
                s.status,
                SignalStatus::ResolvedSuccess | SignalStatus::ResolvedFail
            )
        })
        .count();
    if resolved != trades.len() {
        return Err(StoreError::Inconsistency {
            reason: format!("{resolved} resolved signals but {} trades", trades.len()),
        });
    }
    for trade in trades {
        let matching = signals.iter().find(|s| s.id == trade.signal_id);
        match matching {
            Some(s)
                if matches!(
                    s.status,
                    SignalStatus::ResolvedSuccess | SignalStatus::ResolvedFail
                ) => {}
            Some(_) => {
                return Err(StoreError::Inconsistency {
                    reason: format!("trade for non-resolved signal {}", trade.signal_id),
                });
            }
            None => {
                return Err(StoreError::Inconsistency {
                    reason: format!("trade references unknown signal {}", trade.signal_id),
                });
            }
        }
        if trades
            .iter()
            .filter(|t| t.signal_id == trade.signal_id)
            .count()
            > 1
        {
            return Err(StoreError::Inconsistency {
                reason: format!("multiple trades for signal {}", trade.signal_id),
            });
        }
    }
    Ok(())
}
