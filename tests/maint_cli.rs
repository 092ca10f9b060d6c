mod common;

use assert_cmd::Command;
use chrono::NaiveDate;
use common::{open_default_store, setup_test_env};
use ledgerline::ledgerline_core::{BudgetAggregator, FxBook, LedgerStore};
use ledgerline::ledgerline_domain::{Account, BudgetDraft, BudgetPeriod, CurrencyCode, UserId};
use predicates::str::contains;
use rust_decimal_macros::dec;

fn maint(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ledgerline_maint").expect("binary");
    cmd.env("LEDGERLINE_HOME", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_command_prints_usage() {
    let (home, _) = setup_test_env();
    maint(&home)
        .assert()
        .failure()
        .stderr(contains("Usage: ledgerline_maint"));
}

#[test]
fn audit_of_an_empty_ledger_is_clean() {
    let (home, _) = setup_test_env();
    maint(&home)
        .arg("audit")
        .assert()
        .success()
        .stdout(contains("Ledger is consistent"));
}

#[test]
fn sweep_rolls_over_outdated_budgets() {
    let (home, _) = setup_test_env();
    {
        let mut store = open_default_store(&home);
        BudgetAggregator::create(
            &mut store,
            &FxBook::new(),
            UserId::new(),
            BudgetDraft::new(
                "Groceries",
                CurrencyCode::new("USD"),
                dec!(200),
                BudgetPeriod::Monthly,
                NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
                NaiveDate::from_ymd_opt(2024, 1, 31).expect("date"),
            )
            .repeating(),
        )
        .expect("budget");
    }

    maint(&home)
        .args(["sweep", "--now", "2024-02-10T00:00:00Z"])
        .assert()
        .success()
        .stdout(contains("Archived 1 budget(s), created 1, failed 0"));

    let store = open_default_store(&home);
    assert_eq!(store.all_budgets().expect("budgets").len(), 2);
}

#[test]
fn recompute_repairs_drifted_balances() {
    let (home, _) = setup_test_env();
    {
        let mut store = open_default_store(&home);
        let mut account = store
            .insert_account(Account::new(UserId::new(), "Cash", CurrencyCode::new("USD"), dec!(20)))
            .expect("account");
        account.balance = dec!(35);
        store.save_account(&account).expect("drift");
    }

    maint(&home).arg("audit").assert().code(2).stdout(contains("replays to 20"));
    maint(&home)
        .arg("recompute")
        .assert()
        .success()
        .stdout(contains("1 account(s) repaired"));
    maint(&home)
        .arg("audit")
        .assert()
        .success()
        .stdout(contains("Ledger is consistent"));
}

#[test]
fn bad_arguments_are_reported() {
    let (home, _) = setup_test_env();
    maint(&home)
        .args(["sweep", "--now", "yesterday"])
        .assert()
        .failure()
        .stderr(contains("RFC 3339"));
    maint(&home)
        .arg("upcoming")
        .assert()
        .failure()
        .stderr(contains("needs --user"));
}
