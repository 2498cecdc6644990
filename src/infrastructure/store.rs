use crate::domain::errors::StoreError;
use crate::domain::repositories::SignalRepository;
use crate::domain::types::{Signal, SignalStatus, TradeRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// The persisted record set: signals, append-only trades, and the dates for
/// which a daily run has been verified complete.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SignalBook {
    signals: Vec<Signal>,
    trades: Vec<TradeRecord>,
    completed_runs: BTreeSet<NaiveDate>,
}

impl SignalBook {
    fn insert_signals(&mut self, signals: &[Signal]) -> usize {
        let mut inserted = 0;
        for signal in signals {
            let exists = self
                .signals
                .iter()
                .any(|s| s.ticker == signal.ticker && s.issue_date == signal.issue_date);
            if !exists {
                self.signals.push(signal.clone());
                inserted += 1;
            }
        }
        inserted
    }

    fn resolve_signal(
        &mut self,
        id: Uuid,
        status: SignalStatus,
        trade: TradeRecord,
    ) -> Result<(), StoreError> {
        if self.trades.iter().any(|t| t.signal_id == id) {
            return Err(StoreError::DuplicateResolution {
                signal_id: id,
                trade_date: trade.trade_date,
            });
        }
        let signal = self
            .signals
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::UnknownSignal { signal_id: id })?;
        if signal.status.is_terminal() {
            return Err(StoreError::DuplicateResolution {
                signal_id: id,
                trade_date: trade.trade_date,
            });
        }
        signal.status = status;
        self.trades.push(trade);
        Ok(())
    }

    fn expire_signal(&mut self, id: Uuid) -> Result<(), StoreError> {
        let signal = self
            .signals
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::UnknownSignal { signal_id: id })?;
        if signal.status.is_terminal() {
            return Err(StoreError::DuplicateResolution {
                signal_id: id,
                trade_date: signal.issue_date,
            });
        }
        signal.status = SignalStatus::Expired;
        Ok(())
    }
}

/// JSON-file store with atomic write-temp-then-rename persistence, so a
/// mid-run crash cannot leave a partially written book that the daily
/// verification step misreads as valid.
pub struct JsonSignalStore {
    file_path: PathBuf,
    book: RwLock<SignalBook>,
}

impl JsonSignalStore {
    pub fn open(file_path: PathBuf) -> Result<Self, StoreError> {
        let book = if file_path.exists() {
            let content = fs::read_to_string(&file_path)?;
            serde_json::from_str(&content)?
        } else {
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            SignalBook::default()
        };
        info!(path = %file_path.display(), "opened signal store");
        Ok(Self {
            file_path,
            book: RwLock::new(book),
        })
    }

    fn save(&self, book: &SignalBook) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(book)?;
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.file_path)?;
        Ok(())
    }

    /// Export the merged signal/trade history as CSV for offline analysis.
    pub fn export_history_csv(&self, path: &Path) -> Result<usize, StoreError> {
        let book = self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic");
        let mut writer = csv::Writer::from_path(path).map_err(|e| StoreError::Inconsistency {
            reason: format!("csv open failed: {e}"),
        })?;
        let mut rows = 0;
        for signal in &book.signals {
            let trade = book.trades.iter().find(|t| t.signal_id == signal.id);
            let row = HistoryRow {
                issue_date: signal.issue_date,
                trade_date: trade.map(|t| t.trade_date),
                ticker: signal.ticker.clone(),
                probability: signal.probability,
                threshold_tier: signal.tier,
                status: signal.status.to_string(),
                buy_price: trade.map(|t| t.buy_price),
                sell_price: trade.map(|t| t.sell_price),
                net_return: trade.map(|t| t.net_return),
                is_surge: trade.map(|t| t.is_surge),
            };
            writer.serialize(row).map_err(|e| StoreError::Inconsistency {
                reason: format!("csv write failed: {e}"),
            })?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }
}

#[derive(Serialize)]
struct HistoryRow {
    issue_date: NaiveDate,
    trade_date: Option<NaiveDate>,
    ticker: String,
    probability: f64,
    threshold_tier: f64,
    status: String,
    buy_price: Option<Decimal>,
    sell_price: Option<Decimal>,
    net_return: Option<Decimal>,
    is_surge: Option<bool>,
}

impl SignalRepository for JsonSignalStore {
    fn all_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .signals
            .clone())
    }

    fn pending_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .signals
            .iter()
            .filter(|s| s.status == SignalStatus::Pending)
            .cloned()
            .collect())
    }

    fn insert_signals(&self, signals: &[Signal]) -> Result<usize, StoreError> {
        let mut book = self
            .book
            .write()
            .expect("signal store lock poisoned - concurrent panic");
        let inserted = book.insert_signals(signals);
        self.save(&book)?;
        Ok(inserted)
    }

    fn resolve_signal(
        &self,
        id: Uuid,
        status: SignalStatus,
        trade: TradeRecord,
    ) -> Result<(), StoreError> {
        let mut book = self
            .book
            .write()
            .expect("signal store lock poisoned - concurrent panic");
        book.resolve_signal(id, status, trade)?;
        self.save(&book)
    }

    fn expire_signal(&self, id: Uuid) -> Result<(), StoreError> {
        let mut book = self
            .book
            .write()
            .expect("signal store lock poisoned - concurrent panic");
        book.expire_signal(id)?;
        self.save(&book)
    }

    fn trades(&self) -> Result<Vec<TradeRecord>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .trades
            .clone())
    }

    fn run_completed(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .completed_runs
            .contains(&date))
    }

    fn mark_run_completed(&self, date: NaiveDate) -> Result<(), StoreError> {
        let mut book = self
            .book
            .write()
            .expect("signal store lock poisoned - concurrent panic");
        book.completed_runs.insert(date);
        self.save(&book)
    }
}

/// In-memory store for tests and dry runs. Same invariants, no persistence.
#[derive(Default)]
pub struct MemorySignalStore {
    book: RwLock<SignalBook>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalRepository for MemorySignalStore {
    fn all_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .signals
            .clone())
    }

    fn pending_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .signals
            .iter()
            .filter(|s| s.status == SignalStatus::Pending)
            .cloned()
            .collect())
    }

    fn insert_signals(&self, signals: &[Signal]) -> Result<usize, StoreError> {
        Ok(self
            .book
            .write()
            .expect("signal store lock poisoned - concurrent panic")
            .insert_signals(signals))
    }

    fn resolve_signal(
        &self,
        id: Uuid,
        status: SignalStatus,
        trade: TradeRecord,
    ) -> Result<(), StoreError> {
        self.book
            .write()
            .expect("signal store lock poisoned - concurrent panic")
            .resolve_signal(id, status, trade)
    }

    fn expire_signal(&self, id: Uuid) -> Result<(), StoreError> {
        self.book
            .write()
            .expect("signal store lock poisoned - concurrent panic")
            .expire_signal(id)
    }

    fn trades(&self) -> Result<Vec<TradeRecord>, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .trades
            .clone())
    }

    fn run_completed(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self
            .book
            .read()
            .expect("signal store lock poisoned - concurrent panic")
            .completed_runs
            .contains(&date))
    }

    fn mark_run_completed(&self, date: NaiveDate) -> Result<(), StoreError> {
        self.book
            .write()
            .expect("signal store lock poisoned - concurrent panic")
            .completed_runs
            .insert(date);
        Ok(())
    }
}
