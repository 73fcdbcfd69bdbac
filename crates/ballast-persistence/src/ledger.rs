//! Transaction ledger: one JSON audit record per rebalance attempt.
//!
//! Records what was intended vs. what actually executed, so partial
//! failures can be reconciled after the fact. Files are rewritten in
//! full on every mutation; a crash mid-rebalance leaves an
//! `in_progress` record on disk as the recovery marker. Records are
//! never deleted automatically.

use crate::error::{PersistenceError, PersistenceResult};
use ballast_core::{OrderIntent, OrderResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Terminal (and in-flight) transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    InProgress,
    Completed,
    Partial,
    Failed,
}

/// Durable audit entry for one rebalance attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique id, generated at transaction start.
    pub transaction_id: Uuid,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Operation kind (e.g., "rebalance", "force_rebalance").
    pub operation: String,
    /// Intended orders as computed, symbol -> signed USD amount
    /// (zeroed intents included for traceability).
    pub target_orders: BTreeMap<String, Decimal>,
    /// Executed order results, appended in execution order.
    pub executed_orders: Vec<ExecutedOrder>,
    /// Current status.
    pub status: TransactionStatus,
    /// Top-level error text, set when status is `Failed`.
    pub error_message: Option<String>,
    /// Human-readable reconciliation summary.
    pub reconciliation_notes: Option<String>,
}

/// An order result plus its recording timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedOrder {
    #[serde(flatten)]
    pub result: OrderResult,
    pub timestamp: DateTime<Utc>,
}

/// File-backed transaction ledger.
#[derive(Debug, Clone)]
pub struct TransactionLedger {
    dir: PathBuf,
}

impl TransactionLedger {
    /// Ledger writing into `dir` (created eagerly).
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Begin a transaction: persist an `in_progress` record and return
    /// its id.
    pub fn begin(
        &self,
        operation: &str,
        target_orders: &[OrderIntent],
    ) -> PersistenceResult<Uuid> {
        let transaction_id = Uuid::new_v4();
        let record = TransactionRecord {
            transaction_id,
            timestamp: Utc::now(),
            operation: operation.to_string(),
            target_orders: target_orders
                .iter()
                .map(|intent| (intent.symbol.clone(), intent.amount_usd))
                .collect(),
            executed_orders: Vec::new(),
            status: TransactionStatus::InProgress,
            error_message: None,
            reconciliation_notes: None,
        };
        self.save(&record)?;
        debug!(%transaction_id, operation, "Transaction started");
        Ok(transaction_id)
    }

    /// Append one executed order to the record.
    pub fn record_order(&self, id: Uuid, result: &OrderResult) -> PersistenceResult<()> {
        let mut record = self.load(id)?;
        record.executed_orders.push(ExecutedOrder {
            result: result.clone(),
            timestamp: Utc::now(),
        });
        self.save(&record)
    }

    /// Mark the transaction terminal.
    pub fn complete(
        &self,
        id: Uuid,
        status: TransactionStatus,
        reconciliation_notes: Option<String>,
        error_message: Option<String>,
    ) -> PersistenceResult<()> {
        let mut record = self.load(id)?;
        record.status = status;
        record.reconciliation_notes = reconciliation_notes;
        record.error_message = error_message;
        self.save(&record)?;
        debug!(transaction_id = %id, ?status, "Transaction completed");
        Ok(())
    }

    /// Load one record.
    pub fn load(&self, id: Uuid) -> PersistenceResult<TransactionRecord> {
        let path = self.record_path(id);
        let body = std::fs::read_to_string(&path)
            .map_err(|_| PersistenceError::TransactionNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Most recent transactions, newest first. Corrupt files are
    /// skipped.
    pub fn recent(&self, limit: usize) -> PersistenceResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Ok(body) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if let Ok(record) = serde_json::from_str::<TransactionRecord>(&body) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    fn save(&self, record: &TransactionRecord) -> PersistenceResult<()> {
        let path = self.record_path(record.transaction_id);
        std::fs::write(&path, serde_json::to_vec_pretty(record)?)?;
        Ok(())
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Ledger directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_core::{OrderSide, OrderStatus};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn intents() -> Vec<OrderIntent> {
        vec![
            OrderIntent::new("VTI", dec!(-1000)),
            OrderIntent::new("TLT", dec!(1000)),
            OrderIntent::new("GLD", Decimal::ZERO),
        ]
    }

    fn success_result(symbol: &str) -> OrderResult {
        OrderResult {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            amount_usd: dec!(1000),
            status: OrderStatus::Success,
            order_id: Some("abc-123".to_string()),
            error_message: None,
            retry_count: 0,
        }
    }

    #[test]
    fn test_begin_persists_in_progress() {
        let dir = TempDir::new().unwrap();
        let ledger = TransactionLedger::new(dir.path()).unwrap();

        let id = ledger.begin("rebalance", &intents()).unwrap();
        let record = ledger.load(id).unwrap();

        assert_eq!(record.status, TransactionStatus::InProgress);
        assert_eq!(record.operation, "rebalance");
        assert_eq!(record.target_orders["VTI"], dec!(-1000));
        assert_eq!(record.target_orders["GLD"], Decimal::ZERO);
        assert!(record.executed_orders.is_empty());
    }

    #[test]
    fn test_record_order_appends_incrementally() {
        let dir = TempDir::new().unwrap();
        let ledger = TransactionLedger::new(dir.path()).unwrap();
        let id = ledger.begin("rebalance", &intents()).unwrap();

        ledger.record_order(id, &success_result("VTI")).unwrap();
        ledger.record_order(id, &success_result("TLT")).unwrap();

        let record = ledger.load(id).unwrap();
        assert_eq!(record.executed_orders.len(), 2);
        assert_eq!(record.executed_orders[0].result.symbol, "VTI");
        // Still recoverable as in-progress until completed.
        assert_eq!(record.status, TransactionStatus::InProgress);
    }

    #[test]
    fn test_complete_sets_terminal_state() {
        let dir = TempDir::new().unwrap();
        let ledger = TransactionLedger::new(dir.path()).unwrap();
        let id = ledger.begin("rebalance", &intents()).unwrap();

        ledger
            .complete(
                id,
                TransactionStatus::Partial,
                Some("1 succeeded, 1 failed".to_string()),
                None,
            )
            .unwrap();

        let record = ledger.load(id).unwrap();
        assert_eq!(record.status, TransactionStatus::Partial);
        assert_eq!(
            record.reconciliation_notes.as_deref(),
            Some("1 succeeded, 1 failed")
        );
    }

    #[test]
    fn test_recent_newest_first() {
        let dir = TempDir::new().unwrap();
        let ledger = TransactionLedger::new(dir.path()).unwrap();

        let first = ledger.begin("rebalance", &intents()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = ledger.begin("rebalance", &intents()).unwrap();

        let recent = ledger.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].transaction_id, second);
        assert_eq!(recent[1].transaction_id, first);

        let limited = ledger.recent(1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_unknown_transaction_errors() {
        let dir = TempDir::new().unwrap();
        let ledger = TransactionLedger::new(dir.path()).unwrap();
        let err = ledger.load(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, PersistenceError::TransactionNotFound(_)));
    }
}
