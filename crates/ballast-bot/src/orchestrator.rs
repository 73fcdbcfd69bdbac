//! Rebalance orchestration.
//!
//! Composition root for a single run: wires the broker gateway,
//! executor, persistence, metrics, and notifications together, and owns
//! the two public entry points (`run_daily_check`, rebalance
//! execution). Errors never escape these entry points; every terminal
//! outcome is a logged bool plus exactly one notification.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::report::PerformanceReport;
use ballast_broker::BrokerGateway;
use ballast_core::{OrderIntent, OrderResult, PositionSnapshot, TargetAllocation};
use ballast_engine::{
    buy_phase, calculate_drift, needs_rebalancing, plan_orders, sell_phase, RebalanceConfig,
};
use ballast_executor::OrderExecutor;
use ballast_notify::{Notifier, Severity};
use ballast_persistence::{
    BackupManager, StateLock, StateStore, TransactionLedger, TransactionStatus,
};
use ballast_risk::CircuitBreaker;
use ballast_telemetry::MetricsCollector;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates drift checks and rebalance execution.
pub struct RebalanceOrchestrator {
    broker: Arc<dyn BrokerGateway>,
    executor: OrderExecutor,
    target: TargetAllocation,
    rebalance: RebalanceConfig,
    breaker: CircuitBreaker,
    ledger: TransactionLedger,
    state: StateStore,
    lock: StateLock,
    metrics: Arc<MetricsCollector>,
    notifier: Notifier,
    reports_dir: PathBuf,
}

impl RebalanceOrchestrator {
    /// Build the full orchestration stack from config, injecting the
    /// broker gateway (real client in production, scripted in tests).
    pub fn from_config(config: &AppConfig, broker: Arc<dyn BrokerGateway>) -> AppResult<Self> {
        let metrics = Arc::new(MetricsCollector::new(config.storage.metrics_path()));
        let executor = OrderExecutor::new(broker.clone(), metrics.clone());
        let backup = BackupManager::new(
            config.storage.backup_dir(),
            config.storage.backup_retention_days,
        )?;
        let state = StateStore::new(config.storage.state_path(), Some(backup))?;
        let ledger = TransactionLedger::new(config.storage.ledger_dir())?;
        let lock = StateLock::new(
            config.storage.lock_path(),
            Duration::from_secs(config.storage.lock_timeout_secs),
        )?;

        Ok(Self {
            broker,
            executor,
            target: config.target_allocation()?,
            rebalance: config.rebalance.clone(),
            breaker: CircuitBreaker::new(&config.risk),
            ledger,
            state,
            lock,
            metrics,
            notifier: Notifier::new(config.notify.clone()),
            reports_dir: config.storage.reports_dir(),
        })
    }

    /// The scheduled entry point: breaker check, drift check, and a
    /// rebalance when warranted. Returns false only on operational
    /// failure (lock contention, broker unreachable, failed orders);
    /// a deliberate halt or "no rebalance needed" is a true.
    pub async fn run_daily_check(&self, dry_run: bool) -> bool {
        info!(dry_run, "Starting daily check");
        self.metrics.set_timestamp("autopilot_last_run");

        let outcome = self.daily_check_under_lock(dry_run).await;
        self.flush_metrics();

        match outcome {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "Daily check failed");
                self.metrics.increment("daily_check_failed");
                self.notifier
                    .send(Severity::Critical, &format!("Daily check failed: {e}"))
                    .await;
                false
            }
        }
    }

    async fn daily_check_under_lock(&self, dry_run: bool) -> AppResult<bool> {
        let _guard = self.lock.acquire().await?;

        let account = self.broker.get_account().await?;
        let verdict = self.breaker.check(&account);
        if verdict.triggered {
            warn!(reason = %verdict.reason, "Circuit breaker triggered, halting daily check");
            self.metrics.increment("circuit_breaker_triggered");
            self.notifier
                .send(
                    Severity::Critical,
                    &format!("Circuit breaker halted rebalancing: {}", verdict.reason),
                )
                .await;
            return Ok(true);
        }

        let positions = self.broker.get_positions().await?;
        let snapshot =
            PositionSnapshot::from_positions(&positions, account.portfolio_value, &self.target);
        for (symbol, weight) in snapshot.iter() {
            info!(
                symbol = %symbol,
                current = %weight,
                target = %self.target.weight(symbol),
                "Allocation"
            );
        }

        let drift = calculate_drift(&self.target, &snapshot);
        self.metrics.set_gauge(
            "portfolio_value_usd",
            account.portfolio_value.to_f64().unwrap_or(0.0),
        );
        self.metrics.set_gauge(
            "drift_max_pct",
            (drift.max_abs() * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0),
        );

        let now = Utc::now();
        let last_rebalance = self.state.load()?.map(|marker| marker.timestamp);
        if let Some(last) = last_rebalance {
            self.metrics
                .set_gauge("days_since_rebalance", (now - last).num_days() as f64);
        }

        let decision = needs_rebalancing(&drift, last_rebalance, &self.rebalance, now);
        info!(rebalance = decision.rebalance, reason = %decision.reason, "Rebalance decision");

        if decision.rebalance {
            // The daily check already holds the lock; it is not reentrant.
            Ok(self.execute_operation("rebalance", dry_run, true).await)
        } else {
            Ok(true)
        }
    }

    /// Rebalance regardless of drift and cooldown. Acquires the lock.
    pub async fn force_rebalance(&self, dry_run: bool) -> bool {
        let ok = self.execute_operation("force_rebalance", dry_run, false).await;
        self.flush_metrics();
        ok
    }

    /// Execute a rebalance. `locked` means the caller already holds the
    /// state lock.
    pub async fn execute_rebalance(&self, dry_run: bool, locked: bool) -> bool {
        self.execute_operation("rebalance", dry_run, locked).await
    }

    async fn execute_operation(&self, operation: &str, dry_run: bool, locked: bool) -> bool {
        let guard = if locked {
            None
        } else {
            match self.lock.acquire().await {
                Ok(guard) => Some(guard),
                Err(e) => {
                    error!(error = %e, "Could not start rebalance");
                    self.metrics.increment("rebalance_failed");
                    self.notifier
                        .send(Severity::Critical, &format!("Rebalance aborted: {e}"))
                        .await;
                    return false;
                }
            }
        };

        let result = self.rebalance_under_lock(operation, dry_run).await;
        drop(guard);
        result
    }

    async fn rebalance_under_lock(&self, operation: &str, dry_run: bool) -> bool {
        let started = Instant::now();

        let intents = match self.plan().await {
            Ok(intents) => intents,
            Err(e) => {
                // Nothing was submitted yet; aborting here is safe.
                error!(error = %e, "Rebalance planning failed");
                self.metrics.increment("rebalance_failed");
                self.notifier
                    .send(Severity::Critical, &format!("Rebalance planning failed: {e}"))
                    .await;
                return false;
            }
        };

        let sells = sell_phase(&intents);
        let buys = buy_phase(&intents);
        if sells.is_empty() && buys.is_empty() {
            info!("All planned amounts below minimum trade, nothing to execute");
            return true;
        }

        if dry_run {
            for intent in sells.iter().chain(buys.iter()) {
                info!(
                    symbol = %intent.symbol,
                    amount_usd = %intent.amount_usd,
                    "Dry run: would submit"
                );
            }
            info!(orders = sells.len() + buys.len(), "Dry run complete, no orders submitted");
            return true;
        }

        let tx_id = match self.ledger.begin(operation, &intents) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Could not open transaction record");
                self.metrics.increment("rebalance_failed");
                self.notifier
                    .send(Severity::Critical, &format!("Rebalance aborted: {e}"))
                    .await;
                return false;
            }
        };

        match self
            .run_transaction(tx_id, &sells, &buys, started)
            .await
        {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, transaction_id = %tx_id, "Rebalance failed unexpectedly");
                if let Err(complete_err) =
                    self.ledger
                        .complete(tx_id, TransactionStatus::Failed, None, Some(e.to_string()))
                {
                    error!(error = %complete_err, "Could not record transaction failure");
                }
                self.metrics.increment("rebalance_total");
                self.metrics.increment("rebalance_failed");
                self.notifier
                    .send(
                        Severity::Critical,
                        &format!("Rebalance failed (transaction {tx_id}): {e}"),
                    )
                    .await;
                false
            }
        }
    }

    /// Current plan: fetch account and positions, compute intents.
    async fn plan(&self) -> AppResult<Vec<OrderIntent>> {
        let account = self.broker.get_account().await?;
        let positions = self.broker.get_positions().await?;
        let snapshot =
            PositionSnapshot::from_positions(&positions, account.portfolio_value, &self.target);
        Ok(plan_orders(
            &self.target,
            &snapshot,
            account.portfolio_value,
            &self.rebalance,
        ))
    }

    /// Sells first (freeing cash), then buys. A failed order never
    /// aborts its siblings; the tally decides the terminal status.
    async fn run_transaction(
        &self,
        tx_id: Uuid,
        sells: &[&OrderIntent],
        buys: &[&OrderIntent],
        started: Instant,
    ) -> AppResult<bool> {
        let mut results: Vec<OrderResult> = Vec::with_capacity(sells.len() + buys.len());

        for intent in sells.iter().chain(buys.iter()) {
            let Some(side) = intent.side() else {
                continue;
            };
            let result = self
                .executor
                .execute(
                    &intent.symbol,
                    intent.abs_amount(),
                    side,
                    self.rebalance.max_retries,
                )
                .await;
            self.ledger.record_order(tx_id, &result)?;
            results.push(result);
        }

        let planned: Vec<&OrderIntent> = sells.iter().chain(buys.iter()).copied().collect();
        let reconciliation = reconcile(&planned, &results);
        let notes = reconciliation.notes;
        info!(transaction_id = %tx_id, notes = %notes, "Reconciliation");

        self.metrics.increment("rebalance_total");

        if reconciliation.complete {
            // Marker advances only when every order succeeded.
            self.state.save(Utc::now())?;
            self.ledger
                .complete(tx_id, TransactionStatus::Completed, Some(notes.clone()), None)?;
            self.metrics.increment("rebalance_success");
            self.metrics.record_duration(
                "rebalance_duration_seconds",
                started.elapsed().as_secs_f64(),
            );
            self.metrics.set_timestamp("last_rebalance");
            self.metrics.set_gauge("days_since_rebalance", 0.0);
            self.refresh_portfolio_gauges().await;
            self.notifier
                .send(Severity::Info, &format!("Rebalance completed: {notes}"))
                .await;
            Ok(true)
        } else {
            self.ledger
                .complete(tx_id, TransactionStatus::Partial, Some(notes.clone()), None)?;
            self.metrics.increment("rebalance_partial");
            self.notifier
                .send(
                    Severity::Warning,
                    &format!("Rebalance partially failed (transaction {tx_id}): {notes}"),
                )
                .await;
            Ok(false)
        }
    }

    /// Post-rebalance gauge refresh, best-effort.
    async fn refresh_portfolio_gauges(&self) {
        let (account, positions) =
            match (self.broker.get_account().await, self.broker.get_positions().await) {
                (Ok(account), Ok(positions)) => (account, positions),
                _ => {
                    warn!("Could not refresh portfolio gauges after rebalance");
                    return;
                }
            };
        let snapshot =
            PositionSnapshot::from_positions(&positions, account.portfolio_value, &self.target);
        let drift = calculate_drift(&self.target, &snapshot);
        self.metrics.set_gauge(
            "portfolio_value_usd",
            account.portfolio_value.to_f64().unwrap_or(0.0),
        );
        self.metrics.set_gauge(
            "drift_max_pct",
            (drift.max_abs() * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0),
        );
    }

    /// Snapshot the portfolio into a report.
    pub async fn generate_report(&self) -> AppResult<PerformanceReport> {
        let account = self.broker.get_account().await?;
        let positions = self.broker.get_positions().await?;
        let snapshot =
            PositionSnapshot::from_positions(&positions, account.portfolio_value, &self.target);

        let mut weights = BTreeMap::new();
        for (symbol, weight) in snapshot.iter() {
            weights.insert(symbol.clone(), *weight);
        }

        Ok(PerformanceReport {
            timestamp: Utc::now(),
            portfolio_value: account.portfolio_value,
            cash: account.cash,
            equity: account.equity,
            positions: weights,
        })
    }

    /// Write a report to `reports/report_YYYYMMDD.json`.
    pub fn save_report(&self, report: &PerformanceReport) -> AppResult<PathBuf> {
        crate::report::save_report(&self.reports_dir, report)
    }

    /// Flush metrics; a flush failure is a warning, never fatal.
    pub fn flush_metrics(&self) {
        if let Err(e) = self.metrics.flush() {
            warn!(error = %e, "Metrics flush failed");
        }
    }

    /// Metrics handle, for assertions and external flushing.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Transaction ledger handle.
    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// State store handle.
    pub fn state(&self) -> &StateStore {
        &self.state
    }
}

/// Outcome of matching executed orders back against the plan.
struct Reconciliation {
    /// One line per non-zero intent, then the tally.
    notes: String,
    /// True when every planned intent executed successfully.
    complete: bool,
}

/// Classify every non-zero planned intent against the executed results:
/// success (with order id), failure (with error text), or no execution
/// found (the intent never produced a result at all).
fn reconcile(planned: &[&OrderIntent], results: &[OrderResult]) -> Reconciliation {
    let mut lines = Vec::with_capacity(planned.len() + 2);
    let mut successes = 0usize;
    let mut failed: Vec<&str> = Vec::new();

    for intent in planned {
        match results.iter().find(|r| r.symbol == intent.symbol) {
            Some(result) if result.is_success() => {
                successes += 1;
                lines.push(format!(
                    "{}: success ({})",
                    intent.symbol,
                    result.order_id.as_deref().unwrap_or("no order id")
                ));
            }
            Some(result) => {
                failed.push(intent.symbol.as_str());
                lines.push(format!(
                    "{}: failed ({})",
                    intent.symbol,
                    result.error_message.as_deref().unwrap_or("unknown error")
                ));
            }
            None => {
                failed.push(intent.symbol.as_str());
                lines.push(format!("{}: no execution found", intent.symbol));
            }
        }
    }

    lines.push(format!("{} of {} orders succeeded", successes, planned.len()));
    if !failed.is_empty() {
        lines.push(format!("failed: {}", failed.join(", ")));
    }

    Reconciliation {
        notes: lines.join("; "),
        complete: failed.is_empty(),
    }
}
