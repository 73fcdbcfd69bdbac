//! End-to-end rebalance flow tests against a scripted broker.
//!
//! Covers the terminal outcomes of a daily check: full success,
//! partial failure, dry run, lock contention, and a circuit-breaker
//! halt, asserting the durable side effects (ledger, marker, backups,
//! metrics) of each.

use ballast_bot::{AppConfig, RebalanceOrchestrator, StorageConfig};
use ballast_broker::{BrokerConfig, BrokerGateway, ScriptedBroker};
use ballast_core::{AccountSnapshot, OrderSide, Position};
use ballast_engine::RebalanceConfig;
use ballast_notify::NotifyConfig;
use ballast_persistence::{BackupManager, StateLock, TransactionStatus};
use ballast_risk::RiskConfig;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        allocation: BTreeMap::from([
            ("VTI".to_string(), dec!(0.40)),
            ("TLT".to_string(), dec!(0.30)),
            ("GLD".to_string(), dec!(0.20)),
            ("DBC".to_string(), dec!(0.10)),
        ]),
        rebalance: RebalanceConfig::default(),
        risk: RiskConfig::default(),
        broker: BrokerConfig::default(),
        notify: NotifyConfig::default(),
        storage: StorageConfig {
            data_dir: dir.path().to_path_buf(),
            lock_timeout_secs: 1,
            backup_retention_days: 30,
        },
    }
}

fn healthy_account() -> AccountSnapshot {
    AccountSnapshot {
        cash: dec!(0),
        equity: dec!(10000),
        last_equity: dec!(10000),
        portfolio_value: dec!(10000),
    }
}

/// VTI 50% / TLT 20% / GLD 20% / DBC 10% of $10k: VTI is 10 points
/// overweight, TLT 10 points underweight.
fn drifted_positions() -> Vec<Position> {
    vec![
        Position { symbol: "VTI".to_string(), market_value: dec!(5000) },
        Position { symbol: "TLT".to_string(), market_value: dec!(2000) },
        Position { symbol: "GLD".to_string(), market_value: dec!(2000) },
        Position { symbol: "DBC".to_string(), market_value: dec!(1000) },
    ]
}

fn on_target_positions() -> Vec<Position> {
    vec![
        Position { symbol: "VTI".to_string(), market_value: dec!(4000) },
        Position { symbol: "TLT".to_string(), market_value: dec!(3000) },
        Position { symbol: "GLD".to_string(), market_value: dec!(2000) },
        Position { symbol: "DBC".to_string(), market_value: dec!(1000) },
    ]
}

fn orchestrator(
    config: &AppConfig,
    account: AccountSnapshot,
    positions: Vec<Position>,
) -> (Arc<ScriptedBroker>, RebalanceOrchestrator) {
    let broker = Arc::new(ScriptedBroker::new(account, positions));
    let gateway: Arc<dyn BrokerGateway> = broker.clone();
    let orchestrator = RebalanceOrchestrator::from_config(config, gateway).unwrap();
    (broker, orchestrator)
}

#[tokio::test]
async fn test_daily_check_full_rebalance() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    assert!(orchestrator.run_daily_check(false).await);

    // Sell executed before buy, both for $1000.
    let submitted = broker.submitted_orders();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].symbol, "VTI");
    assert_eq!(submitted[0].side, OrderSide::Sell);
    assert_eq!(submitted[0].amount_usd, dec!(1000));
    assert_eq!(submitted[1].symbol, "TLT");
    assert_eq!(submitted[1].side, OrderSide::Buy);
    assert_eq!(submitted[1].amount_usd, dec!(1000));

    // Ledger: one completed record covering the full planned set.
    let records = orchestrator.ledger().recent(10).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, TransactionStatus::Completed);
    assert_eq!(record.operation, "rebalance");
    assert_eq!(record.target_orders.len(), 4);
    assert_eq!(record.target_orders["GLD"], Decimal::ZERO);
    assert_eq!(record.executed_orders.len(), 2);
    assert!(record.executed_orders.iter().all(|o| o.result.is_success()));

    // Marker advanced and backed up with a valid checksum.
    assert!(orchestrator.state().load().unwrap().is_some());
    let backups = BackupManager::new(config.storage.backup_dir(), 30).unwrap();
    let copy = std::fs::read_dir(config.storage.backup_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .expect("backup copy present");
    backups.verify(&copy).unwrap();

    // Metrics reflect the success.
    let metrics = orchestrator.metrics();
    assert_eq!(metrics.counter("rebalance_total"), 1);
    assert_eq!(metrics.counter("rebalance_success"), 1);
    assert_eq!(metrics.counter("orders_success"), 2);
    assert_eq!(metrics.gauge("days_since_rebalance"), Some(0.0));
}

#[tokio::test]
async fn test_partial_failure_keeps_marker_and_names_symbol() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    // First submission (the VTI sell) is rejected non-retryably; the
    // TLT buy must still be attempted.
    broker.push_rejections(1, 403, "insufficient buying power");

    assert!(!orchestrator.run_daily_check(false).await);
    assert_eq!(broker.submitted_orders().len(), 2);

    let records = orchestrator.ledger().recent(10).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, TransactionStatus::Partial);
    let notes = record.reconciliation_notes.as_deref().unwrap();
    // Reconciliation accounts for every non-zero intent, the succeeded
    // one included, plus the tally.
    assert!(notes.contains("VTI: failed"));
    assert!(notes.contains("TLT: success"));
    assert!(notes.contains("1 of 2 orders succeeded"));
    assert!(notes.contains("failed: VTI"));

    // Marker must not advance on a partial rebalance.
    assert!(orchestrator.state().load().unwrap().is_none());

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.counter("rebalance_partial"), 1);
    assert_eq!(metrics.counter("rebalance_success"), 0);
}

#[tokio::test]
async fn test_dry_run_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    assert!(orchestrator.run_daily_check(true).await);

    assert!(broker.submitted_orders().is_empty());
    assert!(orchestrator.ledger().recent(10).unwrap().is_empty());
    assert!(orchestrator.state().load().unwrap().is_none());
    assert_eq!(orchestrator.metrics().counter("rebalance_total"), 0);
}

#[tokio::test]
async fn test_lock_contention_fails_check_without_orders() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    // Another process holds the state lock for the whole check.
    let contender = StateLock::new(config.storage.lock_path(), Duration::from_secs(1)).unwrap();
    let _held = contender.acquire().await.unwrap();

    assert!(!orchestrator.run_daily_check(false).await);

    assert!(broker.submitted_orders().is_empty());
    assert_eq!(orchestrator.metrics().counter("daily_check_failed"), 1);
    assert!(orchestrator.ledger().recent(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_circuit_breaker_halts_before_any_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    // 6% daily loss against a 5% threshold.
    let account = AccountSnapshot {
        cash: dec!(0),
        equity: dec!(9400),
        last_equity: dec!(10000),
        portfolio_value: dec!(9400),
    };
    let (broker, orchestrator) = orchestrator(&config, account, drifted_positions());

    // A deliberate halt, not an operational failure.
    assert!(orchestrator.run_daily_check(false).await);

    assert!(broker.submitted_orders().is_empty());
    assert!(orchestrator.ledger().recent(10).unwrap().is_empty());
    assert_eq!(orchestrator.metrics().counter("circuit_breaker_triggered"), 1);
}

#[tokio::test]
async fn test_on_target_portfolio_places_no_orders() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), on_target_positions());

    assert!(orchestrator.run_daily_check(false).await);
    assert!(broker.submitted_orders().is_empty());
    assert!(orchestrator.ledger().recent(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_force_rebalance_bypasses_cooldown() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    // A rebalance finished moments ago; the daily check would be in
    // cooldown, but force bypasses the decision entirely.
    orchestrator.state().save(Utc::now()).unwrap();

    assert!(orchestrator.force_rebalance(false).await);
    assert_eq!(broker.submitted_orders().len(), 2);

    let records = orchestrator.ledger().recent(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "force_rebalance");
    assert_eq!(records[0].status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_cooldown_suppresses_daily_rebalance() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (broker, orchestrator) = orchestrator(&config, healthy_account(), drifted_positions());

    orchestrator.state().save(Utc::now()).unwrap();

    // Drift is 10 points, but the 30-day cooldown wins.
    assert!(orchestrator.run_daily_check(false).await);
    assert!(broker.submitted_orders().is_empty());
    assert!(orchestrator.ledger().recent(10).unwrap().is_empty());
}
