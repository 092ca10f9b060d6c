#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ledgerline_core::{FxBook, FxRate, InMemoryStore, LedgerStore};
use ledgerline_domain::{Account, Category, CurrencyCode, UserId};
use rust_decimal_macros::dec;

/// A user with two USD accounts, one EUR account and a category of each polarity.
pub struct Fixture {
    pub store: InMemoryStore,
    pub fx: FxBook,
    pub user: UserId,
    pub checking: Account,
    pub savings: Account,
    pub euro: Account,
    pub groceries: Category,
    pub rent: Category,
    pub salary: Category,
}

impl Fixture {
    pub fn new() -> Self {
        let mut store = InMemoryStore::new();
        let user = UserId::new();
        let checking = store
            .insert_account(Account::new(user, "Checking", usd(), dec!(1000)))
            .expect("checking");
        let savings = store
            .insert_account(Account::new(user, "Savings", usd(), dec!(0)))
            .expect("savings");
        let euro = store
            .insert_account(Account::new(user, "Euro", eur(), dec!(0)))
            .expect("euro");
        let groceries = store
            .insert_category(Category::expense(user, "Groceries"))
            .expect("groceries");
        let rent = store
            .insert_category(Category::expense(user, "Rent"))
            .expect("rent");
        let salary = store
            .insert_category(Category::income(user, "Salary"))
            .expect("salary");
        let mut fx = FxBook::with_tolerance(366);
        fx.add_rate(FxRate::new("USD", "EUR", date(2024, 1, 1), dec!(0.9)));
        Self {
            store,
            fx,
            user,
            checking,
            savings,
            euro,
            groceries,
            rent,
            salary,
        }
    }

    pub fn account(&self, account: &Account) -> Account {
        self.store
            .account(account.id)
            .expect("lookup")
            .expect("account exists")
    }
}

pub fn usd() -> CurrencyCode {
    CurrencyCode::new("USD")
}

pub fn eur() -> CurrencyCode {
    CurrencyCode::new("EUR")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid instant")
}
