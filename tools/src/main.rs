//! desk-runner: headless driver for the dealership back office.
//!
//! Usage:
//!   desk-runner --db desk.db --config-dir ./config demo
//!   desk-runner --db desk.db reconcile
//!   desk-runner --db desk.db dashboard
//!   desk-runner --db desk.db forecast bank_transactions
//!   desk-runner --db desk.db ipc        (JSON lines on stdin/stdout)

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use dealer_desk_core::{
    config::DeskConfig,
    dashboard::DashboardMetrics,
    engine::DeskEngine,
    forecast::ForecastKind,
    model::{Customer, LineItem, Vehicle},
    reconciliation_service::ConfirmMatch,
    repair_order_service::NewRepairOrder,
    store::DeskStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    RunReconciliation,
    ConfirmMatch {
        bank_transaction_id: String,
        deposit_batch_id: String,
        #[serde(default)]
        ai_suggested: bool,
        #[serde(default)]
        ai_confidence: Option<f64>,
        #[serde(default)]
        ai_reasons: Vec<String>,
    },
    RejectMatch {
        match_id: String,
    },
    ResolveException {
        exception_id: String,
        #[serde(default)]
        notes: String,
    },
    Dashboard,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let config_dir = arg_value(&args, "--config-dir").unwrap_or("./config");
    let command = positional(&args).unwrap_or("demo");

    let config = DeskConfig::load(config_dir)?;
    let store = if db == ":memory:" {
        DeskStore::in_memory()?
    } else {
        DeskStore::open(db)?
    };
    let engine = DeskEngine::build(store, config)?;
    let today = Utc::now().date_naive();

    match command {
        "demo" => {
            println!("Dealer desk: demo run");
            println!("  db:          {db}");
            println!("  dealership:  {}", engine.tenant.dealership_id);
            println!();
            seed_demo(&engine, today)?;
            reconcile(&engine)?;
            print_dashboard(&engine.dashboard()?);
        }
        "reconcile" => reconcile(&engine)?,
        "dashboard" => print_dashboard(&engine.dashboard()?),
        "forecast" => forecast(&engine, &args, today)?,
        "ipc" => run_ipc_loop(&engine)?,
        other => bail!("unknown command: {other}"),
    }
    Ok(())
}

/// Four repair orders taken through to deposited batches, plus the demo
/// bank feed. Totals at 8% tax: 54.00, 108.00, 496.80, 81.00.
fn seed_demo(engine: &DeskEngine, today: NaiveDate) -> Result<()> {
    let orders = [
        ("Alice Brown", "Honda", "Civic", vec![
            LineItem::labor("Oil change", 1, 30.0),
            LineItem::part("Oil filter", 2, 10.0),
        ]),
        ("Ben Ortiz", "Toyota", "Camry", vec![
            LineItem::labor("Brake inspection", 1, 60.0),
            LineItem::part("Brake fluid", 2, 20.0),
        ]),
        ("Chen Wei", "Ford", "F-150", vec![
            LineItem::labor("Front brake pad replacement", 2, 120.0),
            LineItem::part("Ceramic brake pads", 1, 220.0),
        ]),
        ("Dana Kim", "Subaru", "Outback", vec![
            LineItem::labor("Tire rotation", 1, 45.0),
            LineItem::part("Valve stem", 3, 10.0),
        ]),
    ];

    for (name, make, model, line_items) in orders {
        let ro = engine.repair_orders().create_repair_order(NewRepairOrder {
            customer: Customer {
                name: name.into(),
                phone: "555-0100".into(),
            },
            vehicle: Vehicle {
                vin: None,
                year: "2021".into(),
                make: make.into(),
                model: model.into(),
            },
            line_items,
        })?;
        engine.repair_orders().close_repair_order(&ro.id)?;
        let receipt = engine.receipts().generate_receipt(&ro.id)?;
        let batch = engine
            .deposit_batches()
            .create_deposit_batch(&[receipt.id.clone()])?;
        engine.deposit_batches().mark_deposited(&batch.id)?;
        println!(
            "  {} -> {} -> {} ({:.2})",
            ro.ro_number, receipt.receipt_number, batch.batch_number, batch.total
        );
    }

    let feed = engine.bank_transactions().seed_demo_transactions(today)?;
    println!("  seeded {} bank transactions", feed.len());
    println!();
    Ok(())
}

fn reconcile(engine: &DeskEngine) -> Result<()> {
    let outcome = engine.run_reconciliation()?;
    println!("=== RECONCILIATION ===");
    println!("  matches created:    {}", outcome.matches_created);
    println!("  exceptions created: {}", outcome.exceptions_created);
    for exc in engine.exceptions().open_exceptions()? {
        println!(
            "  {} {:<22} {:>9.2}  {}",
            exc.exception_number, exc.exception_type, exc.amount, exc.description
        );
    }
    println!();
    Ok(())
}

fn print_dashboard(metrics: &DashboardMetrics) {
    println!("=== DASHBOARD ===");
    println!("  open repair orders:     {}", metrics.open_repair_orders);
    println!("  unbatched receipts:     {}", metrics.unbatched_receipts);
    println!("  unreconciled batches:   {}", metrics.unreconciled_batches);
    println!("  unmatched bank txns:    {}", metrics.unmatched_bank_transactions);
    println!("  open exceptions:        {}", metrics.open_exceptions);
    println!("  close readiness:        {}%", metrics.close_readiness_percentage);
}

fn forecast(engine: &DeskEngine, args: &[String], today: NaiveDate) -> Result<()> {
    let kind = match args.last().map(String::as_str) {
        Some("exception_resolution") => ForecastKind::ExceptionResolution,
        _ => ForecastKind::BankTransactions,
    };
    let report = match kind {
        ForecastKind::BankTransactions => engine.forecast_bank_transactions(today)?,
        ForecastKind::ExceptionResolution => engine.forecast_exception_resolution(today)?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_ipc_loop(engine: &DeskEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        // Rejected operations are reported to the caller; the loop goes on.
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("IPC command failed: {e}");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &DeskEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::RunReconciliation => serde_json::to_value(engine.run_reconciliation()?)?,
        IpcCommand::ConfirmMatch {
            bank_transaction_id,
            deposit_batch_id,
            ai_suggested,
            ai_confidence,
            ai_reasons,
        } => serde_json::to_value(engine.reconciliation().confirm_match(
            &bank_transaction_id,
            &deposit_batch_id,
            ConfirmMatch {
                ai_suggested,
                ai_confidence,
                ai_reasons,
            },
        )?)?,
        IpcCommand::RejectMatch { match_id } => {
            serde_json::to_value(engine.reconciliation().reject_match(&match_id)?)?
        }
        IpcCommand::ResolveException {
            exception_id,
            notes,
        } => serde_json::to_value(
            engine
                .exceptions()
                .resolve_exception(&exception_id, &notes)?,
        )?,
        IpcCommand::Dashboard => serde_json::to_value(engine.dashboard()?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            return Some(arg.as_str());
        }
    }
    None
}
