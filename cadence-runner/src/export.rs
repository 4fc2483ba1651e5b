//! Artifact export: CSV tables and JSON documents for a finished run.
//!
//! - **CSV**: trade log, equity curve, daily records, risk events, task firings
//! - **JSON**: the full `RunResult`, plus computed metrics
//!
//! Every writer reports the file it was writing in its error context.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use cadence_core::engine::RunResult;
use cadence_core::TradeRecord;

use crate::metrics::PerformanceMetrics;

pub const TRADES_CSV: &str = "trades.csv";
pub const EQUITY_CSV: &str = "equity.csv";
pub const DAILY_CSV: &str = "daily.csv";
pub const RISK_EVENTS_CSV: &str = "risk_events.csv";
pub const TASK_FIRINGS_CSV: &str = "task_firings.csv";
pub const RESULT_JSON: &str = "result.json";
pub const METRICS_JSON: &str = "metrics.json";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunResult` to pretty JSON.
pub fn export_json(result: &RunResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize RunResult to JSON")
}

/// Deserialize a `RunResult` from JSON.
pub fn import_json(json: &str) -> Result<RunResult> {
    serde_json::from_str(json).context("failed to deserialize RunResult from JSON")
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade log as CSV.
///
/// Columns: timestamp, asset, side, quantity, price, notional, commission,
/// realized_pnl
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "asset",
        "side",
        "quantity",
        "price",
        "notional",
        "commission",
        "realized_pnl",
    ])?;

    for t in trades {
        let side = if t.is_buy() { "buy" } else { "sell" };
        wtr.write_record([
            t.timestamp.to_string(),
            t.asset.clone(),
            side.to_string(),
            format!("{:.6}", t.quantity),
            format!("{:.6}", t.price),
            format!("{:.2}", t.notional()),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.realized_pnl),
        ])?;
    }

    csv_string(wtr)
}

/// Serialize rows with their serde field names as the header.
pub fn export_rows_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    csv_string(wtr)
}

fn csv_string(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Artifact directory ─────────────────────────────────────────────

/// Files written by `write_artifacts`.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Write every artifact of `result` into `dir`, creating it if needed.
pub fn write_artifacts(dir: &Path, result: &RunResult) -> Result<ArtifactSet> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact directory {}", dir.display()))?;

    let tables = [
        (TRADES_CSV, export_trades_csv(&result.trades)),
        (EQUITY_CSV, export_rows_csv(&result.equity_curve)),
        (DAILY_CSV, export_rows_csv(&result.daily_records)),
        (RISK_EVENTS_CSV, export_rows_csv(&result.risk_events)),
        (TASK_FIRINGS_CSV, export_rows_csv(&result.task_firings)),
    ];

    let mut files = Vec::with_capacity(tables.len() + 2);
    for (name, text) in tables {
        let path = dir.join(name);
        let text = text.with_context(|| format!("failed to build {name}"))?;
        write_text(&path, &text)?;
        files.push(path);
    }

    let path = dir.join(RESULT_JSON);
    write_json(&path, result)?;
    files.push(path);

    let path = dir.join(METRICS_JSON);
    write_json(&path, &PerformanceMetrics::compute(result))?;
    files.push(path);

    info!(dir = %dir.display(), files = files.len(), "artifacts written");
    Ok(ArtifactSet {
        dir: dir.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade(quantity: f64) -> TradeRecord {
        TradeRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            asset: "AAA".into(),
            quantity,
            price: 101.5,
            commission: 1.25,
            realized_pnl: 0.0,
        }
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let csv = export_trades_csv(&[trade(10.0), trade(-4.0)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,asset,side,quantity"));
        assert!(lines[1].contains(",AAA,buy,10.000000,101.500000,1015.00,1.25,"));
        assert!(lines[2].contains(",sell,-4.000000,"));
    }

    #[test]
    fn empty_rows_produce_empty_csv() {
        let rows: Vec<TradeRecord> = Vec::new();
        assert_eq!(export_rows_csv(&rows).unwrap(), "");
    }

    #[test]
    fn serialized_rows_use_field_names() {
        let csv = export_rows_csv(&[trade(3.0)]).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(header, "timestamp,asset,quantity,price,commission,realized_pnl");
    }
}
