//! Forecasts driven through a stand-in process.
#![cfg(unix)]

use chrono::NaiveDate;
use dealer_desk_core::{
    config::ForecastConfig,
    error::DeskError,
    forecast::{AnalyticsService, PythonForecaster},
};
use std::fs;
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// A forecaster running `sh <script>` where the script body is given.
fn forecaster(dir: &TempDir, body: &str) -> PythonForecaster {
    let script = dir.path().join("forecast.sh");
    fs::write(&script, body).unwrap();
    PythonForecaster::new(&ForecastConfig {
        interpreter: "sh".into(),
        script: script.to_string_lossy().into_owned(),
        history_seed: 42,
    })
}

#[test]
fn successful_process_yields_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let runner = forecaster(
        &dir,
        r#"cat > /dev/null
echo '{"success": true, "model_type": "Prophet",
 "historical": {"dates": ["2026-10-17"], "values": [1200.0]},
 "forecast": {"dates": ["2026-10-19"], "values": [1250.0],
              "lower_bound": [900.0], "upper_bound": [1600.0]}}'
"#,
    );
    let report = AnalyticsService::new(&runner, 42)
        .forecast_bank_transactions(today())
        .unwrap();
    assert_eq!(report.forecast_type, "Bank Transactions");
    assert_eq!(report.model_type, "Prophet");
    assert_eq!(report.forecast.values, vec![1250.0]);
    assert_eq!(report.forecast.lower_bound, Some(vec![900.0]));
}

#[test]
fn process_receives_the_typed_request() {
    let dir = tempfile::tempdir().unwrap();
    let runner = forecaster(
        &dir,
        r#"input=$(cat)
case "$input" in
  *'"type":"exception_resolution"'*) kind=ok ;;
  *) kind=bad ;;
esac
if [ "$kind" = ok ]; then
  echo '{"success": true, "model_type": "ARIMA",
   "historical": {"dates": [], "values": []},
   "forecast": {"dates": [], "values": []}}'
else
  echo '{"success": false, "error": "wrong request type"}'
fi
"#,
    );
    let report = AnalyticsService::new(&runner, 42)
        .forecast_exception_resolution(today())
        .unwrap();
    assert_eq!(report.forecast_type, "Exception Resolution Rate");
}

#[test]
fn reported_failure_surfaces_its_message() {
    let dir = tempfile::tempdir().unwrap();
    let runner = forecaster(
        &dir,
        "cat > /dev/null\necho '{\"success\": false, \"error\": \"not enough history\"}'\n",
    );
    match AnalyticsService::new(&runner, 42).forecast_bank_transactions(today()) {
        Err(DeskError::ExternalProcess(msg)) => assert_eq!(msg, "not enough history"),
        other => panic!("expected a process failure, got {other:?}"),
    }
}

#[test]
fn non_zero_exit_uses_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let runner = forecaster(&dir, "cat > /dev/null\necho 'missing module' >&2\nexit 3\n");
    match AnalyticsService::new(&runner, 42).forecast_bank_transactions(today()) {
        Err(DeskError::ExternalProcess(msg)) => assert_eq!(msg, "missing module"),
        other => panic!("expected a process failure, got {other:?}"),
    }
}

#[test]
fn garbage_output_and_missing_interpreter_fail() {
    let dir = tempfile::tempdir().unwrap();
    let runner = forecaster(&dir, "cat > /dev/null\necho 'Traceback (most recent call last)'\n");
    assert!(matches!(
        AnalyticsService::new(&runner, 42).forecast_bank_transactions(today()),
        Err(DeskError::ExternalProcess(_))
    ));

    let missing = PythonForecaster::new(&ForecastConfig {
        interpreter: dir.path().join("no-such-python").to_string_lossy().into_owned(),
        script: "forecast.py".into(),
        history_seed: 42,
    });
    assert!(matches!(
        AnalyticsService::new(&missing, 42).forecast_bank_transactions(today()),
        Err(DeskError::ExternalProcess(_))
    ));
}
