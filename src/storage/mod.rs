//! Report persistence.
//!
//! Writes the session's snapshots as a CSV file, once, at session end.
//! The file is written under a temporary name and renamed into place, so
//! a failed or interrupted write never leaves a partial report behind.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{round_cents, WalletSnapshot};

pub const REPORT_COLUMNS: [&str; 7] = [
    "timestamp_utc",
    "wallet",
    "eth_balance",
    "eth_usd",
    "xyo_balance",
    "xyo_usd",
    "total_usd",
];

const MAX_SAME_SECOND_REPORTS: u32 = 999;

/// One CSV row, already formatted for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub timestamp_utc: String,
    pub wallet: String,
    pub eth_balance: String,
    pub eth_usd: String,
    pub xyo_balance: String,
    pub xyo_usd: String,
    pub total_usd: String,
}

impl From<&WalletSnapshot> for ReportRow {
    fn from(s: &WalletSnapshot) -> Self {
        let usd = |v: Option<rust_decimal::Decimal>| {
            v.map(|d| format!("{:.2}", round_cents(d))).unwrap_or_default()
        };
        Self {
            timestamp_utc: s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            wallet: s.wallet.clone(),
            eth_balance: format!("{:.10}", s.eth_balance.round_dp(10)),
            eth_usd: usd(s.eth_value_usd()),
            xyo_balance: format!("{:.10}", s.xyo_balance.round_dp(10)),
            xyo_usd: usd(s.xyo_value_usd()),
            total_usd: usd(s.total_value_usd()),
        }
    }
}

/// `portfolio_report_YYYYMMDD_HHMMSS.csv` for the given UTC instant.
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("portfolio_report_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Write all snapshots, in order, to a new report in `dir`.
pub fn write_report(dir: &Path, snapshots: &[WalletSnapshot], at: DateTime<Utc>) -> Result<PathBuf> {
    if snapshots.is_empty() {
        bail!("refusing to write an empty report");
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = unused_report_path(dir, at)?;
    let tmp = dir.join(format!(".{}.tmp", report_file_name(at)));

    if let Err(e) = write_rows(&tmp, snapshots) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| {
            format!("Failed to move report into place at {}", path.display())
        });
    }

    info!(path = %path.display(), rows = snapshots.len(), "CSV report written");
    Ok(path)
}

/// First free name for a report ending at `at`. A second session ending in
/// the same second gets `_1`, then `_2`, and so on.
fn unused_report_path(dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    let base = report_file_name(at);
    let candidate = dir.join(&base);
    if !candidate.exists() {
        return Ok(candidate);
    }
    let stem = base.trim_end_matches(".csv");
    for n in 1..=MAX_SAME_SECOND_REPORTS {
        let candidate = dir.join(format!("{stem}_{n}.csv"));
        if !candidate.exists() {
            debug!(path = %candidate.display(), "Report name taken; using suffix");
            return Ok(candidate);
        }
    }
    bail!(
        "{} and {MAX_SAME_SECOND_REPORTS} suffixed variants already exist in {}",
        base,
        dir.display()
    )
}

fn write_rows(path: &Path, snapshots: &[WalletSnapshot]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for snapshot in snapshots {
        writer
            .serialize(ReportRow::from(snapshot))
            .context("Failed to write report row")?;
    }
    writer.flush().context("Failed to flush report")?;
    debug!(path = %path.display(), "Report rows flushed");
    Ok(())
}

/// Read a report back, rejecting files whose header is not `REPORT_COLUMNS`.
pub fn read_report(path: &Path) -> Result<Vec<ReportRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open report {}", path.display()))?;
    let headers = reader.headers().context("Failed to read report header")?.clone();
    if headers.iter().ne(REPORT_COLUMNS.iter().copied()) {
        bail!("unexpected report header: {:?}", headers);
    }
    reader
        .deserialize()
        .collect::<Result<Vec<ReportRow>, _>>()
        .context("Failed to parse report rows")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
