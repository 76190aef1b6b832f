//! Forecasts produced by an external statistics process.
//!
//! The process reads `{"type": ..., "data": [...]}` on stdin and writes one
//! JSON object on stdout:
//!   `{"success": true, "model_type": ..., "historical": {...}, "forecast": {...}}`
//!   `{"success": false, "error": "..."}`
//!
//! There is no fallback forecast. Every failure surfaces as
//! `DeskError::ExternalProcess` carrying the process's own message.

use crate::{
    analytics::{historical_bank_transactions, historical_exceptions},
    config::ForecastConfig,
    error::{DeskError, DeskResult},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastKind {
    BankTransactions,
    ExceptionResolution,
}

impl ForecastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransactions => "bank_transactions",
            Self::ExceptionResolution => "exception_resolution",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BankTransactions => "Bank Transactions",
            Self::ExceptionResolution => "Exception Resolution Rate",
        }
    }
}

/// What is handed to the forecast process.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRequest {
    #[serde(rename = "type")]
    pub kind: ForecastKind,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub forecast_type: String,
    pub model_type: String,
    pub historical: ForecastSeries,
    pub forecast: ForecastSeries,
}

#[derive(Deserialize)]
struct ForecastOutput {
    success: bool,
    model_type: Option<String>,
    historical: Option<ForecastSeries>,
    forecast: Option<ForecastSeries>,
    error: Option<String>,
}

/// Parse what the process printed. `success: false`, missing series and
/// malformed JSON are all failures.
pub fn parse_forecast_output(kind: ForecastKind, stdout: &str) -> DeskResult<ForecastReport> {
    let output: ForecastOutput = serde_json::from_str(stdout.trim()).map_err(|e| {
        DeskError::ExternalProcess(format!("unparseable forecast output: {e}"))
    })?;

    if !output.success {
        return Err(DeskError::ExternalProcess(
            output
                .error
                .unwrap_or_else(|| "forecast reported failure without a message".into()),
        ));
    }

    match (output.historical, output.forecast) {
        (Some(historical), Some(forecast)) => Ok(ForecastReport {
            forecast_type: kind.label().to_string(),
            model_type: output.model_type.unwrap_or_default(),
            historical,
            forecast,
        }),
        _ => Err(DeskError::ExternalProcess(
            "forecast output is missing its series".into(),
        )),
    }
}

/// Anything that can turn historical records into a forecast.
pub trait ForecastRunner {
    fn forecast(&self, request: &ForecastRequest) -> DeskResult<ForecastReport>;
}

/// Runs `<interpreter> <script>` and talks JSON over its stdio.
pub struct PythonForecaster {
    interpreter: String,
    script: String,
}

impl PythonForecaster {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: config.script.clone(),
        }
    }
}

impl ForecastRunner for PythonForecaster {
    fn forecast(&self, request: &ForecastRequest) -> DeskResult<ForecastReport> {
        log::info!("Calling forecast process: {} {}", self.interpreter, self.script);
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DeskError::ExternalProcess(format!("cannot start {}: {e}", self.interpreter))
            })?;

        // Written from a separate thread so a process that answers before
        // draining stdin cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&payload) {
                    log::warn!("Forecast process closed stdin early: {e}");
                }
            })
        });

        let output = child.wait_with_output()?;
        if let Some(handle) = writer {
            let _ = handle.join();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            // Prefer the error the process reported on stdout.
            let message = serde_json::from_str::<ForecastOutput>(stdout.trim())
                .ok()
                .and_then(|o| o.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&output.stderr).trim().to_string());
            log::error!("Forecast process failed ({}): {message}", output.status);
            return Err(DeskError::ExternalProcess(message));
        }

        let report = parse_forecast_output(request.kind, &stdout);
        match &report {
            Ok(r) => log::info!("{} forecast generated with {}", r.forecast_type, r.model_type),
            Err(e) => log::error!("{} forecast failed: {e}", request.kind.label()),
        }
        report
    }
}

/// Builds simulated history and asks a runner to forecast it.
pub struct AnalyticsService<'a> {
    runner: &'a dyn ForecastRunner,
    history_seed: u64,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(runner: &'a dyn ForecastRunner, history_seed: u64) -> Self {
        Self {
            runner,
            history_seed,
        }
    }

    /// Thirty-day forecast of daily credit totals.
    pub fn forecast_bank_transactions(&self, today: NaiveDate) -> DeskResult<ForecastReport> {
        let data = historical_bank_transactions(today, self.history_seed);
        self.runner.forecast(&ForecastRequest {
            kind: ForecastKind::BankTransactions,
            data: serde_json::to_value(data)?,
        })
    }

    /// Six-month forecast of the monthly exception resolution rate.
    pub fn forecast_exception_resolution(&self, today: NaiveDate) -> DeskResult<ForecastReport> {
        let data = historical_exceptions(today, self.history_seed);
        self.runner.forecast(&ForecastRequest {
            kind: ForecastKind::ExceptionResolution,
            data: serde_json::to_value(data)?,
        })
    }
}
