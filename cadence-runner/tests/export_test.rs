//! Artifact export of a real run, plus config files on disk.

use cadence_core::calendar::{Session, WeekdayCalendar};
use cadence_core::data::Timeline;
use cadence_core::engine::{run_backtest, EngineConfig, RunResult};
use cadence_core::risk::RiskLimits;
use cadence_core::schedule::{Scheduler, TaskHandle};
use cadence_core::strategy::{StepContext, Strategy, TargetWeights};
use cadence_core::synthetic::{minute_universe, weekdays, WalkParams};
use cadence_core::SetupError;
use cadence_runner::config::{ConfigError, RunConfig};
use cadence_runner::export::{
    import_json, write_artifacts, DAILY_CSV, EQUITY_CSV, METRICS_JSON, RESULT_JSON,
    RISK_EVENTS_CSV, TASK_FIRINGS_CSV, TRADES_CSV,
};
use cadence_runner::metrics::PerformanceMetrics;
use chrono::NaiveDate;
use std::fs;

/// Rebalances into AAA once a day at 10:00, capped by the weight limit.
struct MorningBuyer {
    armed: bool,
}

impl Strategy for MorningBuyer {
    fn register(&mut self, scheduler: &mut Scheduler) -> Result<(), SetupError> {
        scheduler.register_daily("arm", "10:00")?;
        Ok(())
    }

    fn on_task(&mut self, _task: &TaskHandle, _ctx: &StepContext<'_>) {
        self.armed = true;
    }

    fn on_bar(&mut self, ctx: &StepContext<'_>) -> TargetWeights {
        if !std::mem::take(&mut self.armed) {
            // Keep whatever is held.
            return ctx
                .portfolio
                .positions
                .keys()
                .map(|a| (a.clone(), ctx.portfolio.weight(a)))
                .collect();
        }
        let mut weights = TargetWeights::new();
        weights.insert("AAA".to_string(), 0.6);
        weights
    }
}

fn sample_run() -> RunResult {
    let dates = weekdays(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(), 2);
    let session = Session::parse("09:30", "10:30").unwrap();
    let bars = minute_universe(3, &["AAA", "BBB"], &dates, session, WalkParams::default());
    let timeline = Timeline::align(bars).unwrap();
    let calendar = WeekdayCalendar::new(Session::parse("09:30", "16:00").unwrap());
    let config = EngineConfig::new(100_000.0).with_limits(RiskLimits {
        max_asset_weight: Some(0.4),
        ..RiskLimits::default()
    });
    run_backtest(&timeline, &calendar, &config, &mut MorningBuyer { armed: false }).unwrap()
}

#[test]
fn writes_every_artifact() {
    let result = sample_run();
    assert!(!result.trades.is_empty());
    assert!(!result.risk_events.is_empty());
    assert_eq!(result.task_firings.len(), 2);

    let temp_dir = tempfile::tempdir().unwrap();
    let out = temp_dir.path().join("run-1");
    let artifacts = write_artifacts(&out, &result).unwrap();

    assert_eq!(artifacts.files.len(), 7);
    for name in [
        TRADES_CSV,
        EQUITY_CSV,
        DAILY_CSV,
        RISK_EVENTS_CSV,
        TASK_FIRINGS_CSV,
        RESULT_JSON,
        METRICS_JSON,
    ] {
        assert!(out.join(name).is_file(), "{name} missing");
    }

    let trades = fs::read_to_string(out.join(TRADES_CSV)).unwrap();
    assert_eq!(trades.lines().count(), result.trades.len() + 1);

    let equity = fs::read_to_string(out.join(EQUITY_CSV)).unwrap();
    assert_eq!(equity.lines().next(), Some("timestamp,equity,cash"));
    assert_eq!(equity.lines().count(), result.equity_curve.len() + 1);

    let risk = fs::read_to_string(out.join(RISK_EVENTS_CSV)).unwrap();
    assert!(risk.contains("max_asset_weight"));

    let firings = fs::read_to_string(out.join(TASK_FIRINGS_CSV)).unwrap();
    assert_eq!(firings.lines().count(), 3);
    assert!(firings.contains(",arm"));

    let daily = fs::read_to_string(out.join(DAILY_CSV)).unwrap();
    assert_eq!(daily.lines().count(), 3);
}

#[test]
fn result_json_round_trips() {
    let result = sample_run();
    let temp_dir = tempfile::tempdir().unwrap();
    write_artifacts(temp_dir.path(), &result).unwrap();

    let json = fs::read_to_string(temp_dir.path().join(RESULT_JSON)).unwrap();
    let loaded = import_json(&json).unwrap();
    assert_eq!(loaded.trades.len(), result.trades.len());
    assert_eq!(loaded.equity_curve.len(), result.equity_curve.len());
    assert_eq!(loaded.task_firings, result.task_firings);
    assert_eq!(loaded.stop_reason, result.stop_reason);
    assert!((loaded.final_equity() - result.final_equity()).abs() < 1e-6);

    let metrics: PerformanceMetrics =
        serde_json::from_str(&fs::read_to_string(temp_dir.path().join(METRICS_JSON)).unwrap())
            .unwrap();
    assert_eq!(metrics.trade_count, result.trades.len());
}

#[test]
fn unwritable_directory_reports_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let blocker = temp_dir.path().join("file");
    fs::write(&blocker, "x").unwrap();

    let err = write_artifacts(&blocker.join("nested"), &sample_run()).unwrap_err();
    assert!(format!("{err:#}").contains("nested"));
}

#[test]
fn config_loads_from_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("run.toml");
    fs::write(
        &path,
        "name = \"from-disk\"\ninitial_cash = 20000.0\n\n[limits]\nmax_gross_leverage = 1.0\n",
    )
    .unwrap();

    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.name, "from-disk");
    assert_eq!(config.to_engine_config().limits.max_gross_leverage, Some(1.0));

    fs::write(&path, "initial_cash = \"lots\"").unwrap();
    assert!(matches!(RunConfig::load(&path), Err(ConfigError::Parse(_))));
}
