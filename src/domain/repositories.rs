use crate::domain::errors::StoreError;
use crate::domain::types::{Signal, SignalStatus, TradeRecord};
use chrono::NaiveDate;
use uuid::Uuid;

/// Signal history store: signals with live status, append-only trade
/// history, and completed-run markers for daily idempotence.
///
/// Implementations must enforce the resolution invariants themselves:
/// a signal is resolved at most once (`DuplicateResolution` is a defensive
/// error, never an expected path) and trades are never rewritten.
pub trait SignalRepository: Send + Sync {
    fn all_signals(&self) -> Result<Vec<Signal>, StoreError>;

    fn pending_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// Insert new pending signals, skipping any (ticker, issue_date) already
    /// present so a re-run after a partial failure cannot duplicate them.
    /// Returns the number actually inserted.
    fn insert_signals(&self, signals: &[Signal]) -> Result<usize, StoreError>;

    /// Move a pending signal to a resolved status and append its trade.
    fn resolve_signal(
        &self,
        id: Uuid,
        status: SignalStatus,
        trade: TradeRecord,
    ) -> Result<(), StoreError>;

    /// Move a pending signal to `Expired` (no trade record).
    fn expire_signal(&self, id: Uuid) -> Result<(), StoreError>;

    fn trades(&self) -> Result<Vec<TradeRecord>, StoreError>;

    fn run_completed(&self, date: NaiveDate) -> Result<bool, StoreError>;

    fn mark_run_completed(&self, date: NaiveDate) -> Result<(), StoreError>;
}
