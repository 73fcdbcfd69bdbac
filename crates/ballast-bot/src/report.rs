//! Portfolio performance reports.

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Point-in-time portfolio snapshot for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    pub equity: Decimal,
    /// Current position weights, symbol -> fraction of portfolio.
    pub positions: BTreeMap<String, Decimal>,
}

/// Write `report` to `dir/report_YYYYMMDD.json`, overwriting any
/// earlier report from the same day.
pub fn save_report(dir: &Path, report: &PerformanceReport) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("report_{}.json", report.timestamp.format("%Y%m%d")));
    std::fs::write(&path, serde_json::to_vec_pretty(report)?)?;
    info!(path = %path.display(), "Report written");
    Ok(path)
}
