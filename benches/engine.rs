use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ledgerline_core::{
    BalanceChainRecalculator, InMemoryStore, LedgerSnapshot, LedgerStore, RecurrenceExpander,
};
use ledgerline_domain::{
    Account, AccountId, CurrencyCode, PlannedTransaction, PlannedTransactionId, RecurrenceRule,
    Transaction, TransactionId, UserId,
};
use ledgerline_storage_json::{load_snapshot, save_snapshot};
use rust_decimal::Decimal;
use tempfile::tempdir;

fn build_sample_store(txn_count: usize) -> (InMemoryStore, AccountId) {
    let mut store = InMemoryStore::new();
    let user = UserId::new();
    let account = store
        .insert_account(Account::new(
            user,
            "Checking",
            CurrencyCode::new("USD"),
            Decimal::new(100_000, 0),
        ))
        .expect("account");

    let start = Utc
        .with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
        .single()
        .expect("valid instant");
    for idx in 0..txn_count {
        store
            .insert_transaction(Transaction {
                id: TransactionId::default(),
                user_id: user,
                account_id: account.id,
                category_id: None,
                amount: Decimal::new(5_000 + (idx % 100) as i64, 2),
                currency: account.currency.clone(),
                is_income: idx % 7 == 0,
                is_transfer: false,
                linked_transaction_id: None,
                exchange_rate: None,
                new_balance: Decimal::ZERO,
                date_time: start + Duration::hours((idx % 8760) as i64),
                label: None,
                notes: None,
                is_deleted: false,
            })
            .expect("transaction");
    }
    (store, account.id)
}

fn bench_chain_recompute(c: &mut Criterion) {
    let (store, account) = build_sample_store(black_box(10_000));

    c.bench_function("chain_recompute_10k", |b| {
        b.iter_batched(
            || store.clone(),
            |mut store| {
                let balance =
                    BalanceChainRecalculator::recompute(&mut store, account).expect("recompute");
                black_box(balance);
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_snapshot_io(c: &mut Criterion) {
    let (store, _) = build_sample_store(black_box(10_000));
    let snapshot: LedgerSnapshot = store.snapshot();
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ledger.json");

    c.bench_function("snapshot_save_10k", |b| {
        b.iter(|| save_snapshot(&snapshot, &path).expect("save"))
    });

    c.bench_function("snapshot_load_10k", |b| {
        b.iter(|| black_box(load_snapshot(&path).expect("load")))
    });
}

fn bench_expansion(c: &mut Criterion) {
    let start = Utc
        .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .expect("valid instant");
    let planned = PlannedTransaction {
        id: PlannedTransactionId(1),
        user_id: UserId::new(),
        account_id: None,
        label: Some("Coffee".into()),
        notes: None,
        amount: Decimal::new(450, 2),
        currency: CurrencyCode::new("USD"),
        is_income: false,
        planned_date: start,
        is_recurring: true,
        recurrence_rule: Some(RecurrenceRule::daily()),
        is_executed: false,
        is_active: true,
        is_deleted: false,
        created_at: start,
    };
    let end = start + Duration::days(3650);

    c.bench_function("expand_daily_capped", |b| {
        b.iter(|| black_box(RecurrenceExpander::generate_occurrences(&planned, start, end)))
    });
}

criterion_group!(benches, bench_chain_recompute, bench_snapshot_io, bench_expansion);
criterion_main!(benches);
