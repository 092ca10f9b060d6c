use std::{env, process};

use chrono::{DateTime, Utc};
use ledgerline::{
    init,
    ledgerline_config::ConfigManager,
    ledgerline_domain::UserId,
    Engine, LedgerError, LedgerResult,
};
use ledgerline_storage_json::JsonLedgerStore;
use uuid::Uuid;

const DEFAULT_UPCOMING_DAYS: i64 = 30;
const COMMANDS: [&str; 5] = ["sweep", "audit", "recompute", "upcoming", "forecast"];

fn main() {
    init();

    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

struct Options {
    ledger: Option<String>,
    now: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    user: Option<UserId>,
    days: i64,
}

fn run() -> LedgerResult<i32> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(1);
    };
    if !COMMANDS.contains(&command.as_str()) {
        print_usage();
        return Ok(1);
    }
    let options = parse_options(args)?;
    let now = options.now.unwrap_or_else(Utc::now);

    let config = ConfigManager::from_env()?.load()?;
    let mut engine = match options.ledger.as_deref() {
        Some(name) => Engine::open_ledger(config, name)?,
        None => Engine::open(config)?,
    };

    match command.as_str() {
        "sweep" => {
            let report = engine.sweep(now)?;
            println!(
                "Archived {} budget(s), created {}, failed {}",
                report.archived.len(),
                report.created.len(),
                report.failed.len()
            );
            for failure in &report.failed {
                println!("  {}: {}", failure.budget_id, failure.reason);
            }
        }
        "audit" => return audit(&engine),
        "recompute" => {
            let repairs = engine.recompute()?;
            for repair in &repairs {
                println!(
                    "{}: {} -> {}",
                    repair.account_id, repair.previous, repair.replayed
                );
            }
            println!("Recomputed balance chains; {} account(s) repaired", repairs.len());
        }
        "upcoming" => {
            let user = require_user(&options)?;
            let rows = engine.upcoming(user, now, options.days)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "forecast" => {
            let user = require_user(&options)?;
            let until = options
                .until
                .ok_or_else(|| LedgerError::InvalidArgument("forecast needs --until".into()))?;
            let forecast = engine.future_balance(user, now, until)?;
            println!("Current:  {} {}", forecast.current_balance, forecast.base_currency);
            println!(
                "Income:   {} ({} occurrence(s))",
                forecast.planned_income, forecast.income_count
            );
            println!(
                "Expenses: {} ({} occurrence(s))",
                forecast.planned_expenses, forecast.expense_count
            );
            println!("Projected: {} {}", forecast.projected_balance, forecast.base_currency);
        }
        _ => {
            print_usage();
            return Ok(1);
        }
    }
    Ok(0)
}

fn audit(engine: &Engine<JsonLedgerStore>) -> LedgerResult<i32> {
    let report = engine.audit()?;
    if report.is_clean() {
        println!("Ledger is consistent");
        return Ok(0);
    }
    for chain in &report.chains {
        println!(
            "{}: stored balance {} but chain replays to {} ({} drifted row(s))",
            chain.account_id,
            chain.stored_balance,
            chain.replayed_balance,
            chain.drift.len()
        );
    }
    for drift in &report.budgets {
        println!(
            "{}: collected {} but a rescan gives {}",
            drift.budget_id, drift.stored, drift.expected
        );
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(2)
}

fn parse_options(mut args: impl Iterator<Item = String>) -> LedgerResult<Options> {
    let mut options = Options {
        ledger: None,
        now: None,
        until: None,
        user: None,
        days: DEFAULT_UPCOMING_DAYS,
    };
    while let Some(flag) = args.next() {
        let value = args
            .next()
            .ok_or_else(|| LedgerError::InvalidArgument(format!("{flag} needs a value")))?;
        match flag.as_str() {
            "--ledger" => options.ledger = Some(value),
            "--now" => options.now = Some(parse_instant(&value)?),
            "--until" => options.until = Some(parse_instant(&value)?),
            "--user" => {
                let id = Uuid::parse_str(&value)
                    .map_err(|err| LedgerError::InvalidArgument(format!("--user: {err}")))?;
                options.user = Some(UserId(id));
            }
            "--days" => {
                options.days = value
                    .parse()
                    .map_err(|err| LedgerError::InvalidArgument(format!("--days: {err}")))?;
            }
            other => {
                return Err(LedgerError::InvalidArgument(format!("unknown option {other}")));
            }
        }
    }
    Ok(options)
}

fn parse_instant(value: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| LedgerError::InvalidArgument(format!("`{value}` is not RFC 3339: {err}")))
}

fn require_user(options: &Options) -> LedgerResult<UserId> {
    options
        .user
        .ok_or_else(|| LedgerError::InvalidArgument("this command needs --user".into()))
}

fn print_usage() {
    eprintln!(
        "Usage: ledgerline_maint <command> [--ledger NAME] [--now RFC3339]\n\
         Commands:\n  \
         sweep\n  \
         audit\n  \
         recompute\n  \
         upcoming --user UUID [--days N]\n  \
         forecast --user UUID --until RFC3339"
    );
}
