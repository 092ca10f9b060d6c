mod common;

use common::{at, Fixture};
use ledgerline_core::{
    BalanceChainRecalculator, CoreError, LedgerAudit, LedgerStore, TransactionProcessor,
};
use ledgerline_domain::{Account, AccountId, CurrencyCode, TransactionDraft, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn expense_update_rewrites_balance_and_chain() {
    let mut fx = Fixture::new();
    let created = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(100), fx.groceries.id)
            .at(at(2024, 1, 10, 9, 0)),
    )
    .expect("create expense");
    assert_eq!(fx.account(&fx.checking).balance, dec!(900));
    assert_eq!(created.transaction.new_balance, dec!(900));

    let updated = TransactionProcessor::update(
        &mut fx.store,
        &fx.fx,
        fx.user,
        created.transaction.id,
        TransactionDraft::expense(fx.checking.id, dec!(150), fx.groceries.id),
    )
    .expect("update expense");
    assert_eq!(fx.account(&fx.checking).balance, dec!(850));
    assert_eq!(updated.transaction.new_balance, dec!(850));
    assert_eq!(updated.transaction.date_time, at(2024, 1, 10, 9, 0));
    assert!(LedgerAudit::run(&fx.store, &fx.fx).expect("audit").is_clean());
}

#[test]
fn moving_an_expense_to_another_account_rewrites_both_chains() {
    let mut fx = Fixture::new();
    let moved = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(100), fx.groceries.id)
            .at(at(2024, 1, 10, 9, 0)),
    )
    .expect("first expense");
    let stays = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(30), fx.groceries.id)
            .at(at(2024, 1, 12, 9, 0)),
    )
    .expect("second expense");
    assert_eq!(stays.transaction.new_balance, dec!(870));

    let updated = TransactionProcessor::update(
        &mut fx.store,
        &fx.fx,
        fx.user,
        moved.transaction.id,
        TransactionDraft::expense(fx.savings.id, dec!(40), fx.groceries.id),
    )
    .expect("move to savings");
    assert_eq!(updated.transaction.account_id, fx.savings.id);
    assert_eq!(updated.transaction.new_balance, dec!(-40));

    assert_eq!(fx.account(&fx.checking).balance, dec!(970));
    assert_eq!(fx.account(&fx.savings).balance, dec!(-40));
    let stays = fx
        .store
        .transaction(stays.transaction.id)
        .expect("lookup")
        .expect("exists");
    assert_eq!(stays.new_balance, dec!(970));

    for account in [fx.checking.id, fx.savings.id] {
        let chain = BalanceChainRecalculator::verify(&fx.store, account).expect("verify");
        assert!(chain.is_consistent(), "{:?}", chain);
    }
    assert!(LedgerAudit::run(&fx.store, &fx.fx).expect("audit").is_clean());
}

#[test]
fn backdated_transaction_reflows_later_chain_entries() {
    let mut fx = Fixture::new();
    let later = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(100), fx.groceries.id)
            .at(at(2024, 1, 10, 9, 0)),
    )
    .expect("later");
    let earlier = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::income(fx.checking.id, dec!(50), fx.salary.id).at(at(2024, 1, 5, 9, 0)),
    )
    .expect("earlier");

    assert_eq!(earlier.transaction.new_balance, dec!(1050));
    let later = fx
        .store
        .transaction(later.transaction.id)
        .expect("lookup")
        .expect("exists");
    assert_eq!(later.new_balance, dec!(950));
    assert_eq!(fx.account(&fx.checking).balance, dec!(950));
}

#[test]
fn cross_currency_transfer_uses_supplied_target_amount() {
    let mut fx = Fixture::new();
    let outcome = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.euro.id, dec!(100))
            .with_target_amount(dec!(92))
            .at(at(2024, 1, 15, 12, 0)),
    )
    .expect("transfer");

    let source = &outcome.transaction;
    let target = outcome.linked.as_ref().expect("target leg");
    assert_eq!(fx.account(&fx.checking).balance, dec!(900));
    assert_eq!(fx.account(&fx.euro).balance, dec!(92));
    assert_eq!(source.exchange_rate, Some(dec!(0.92)));
    assert!(!source.is_income && target.is_income);
    assert!(source.is_transfer && target.is_transfer);
    assert_eq!(source.linked_transaction_id, Some(target.id));
    assert_eq!(target.linked_transaction_id, Some(source.id));
    assert_eq!(target.amount, dec!(92));
    assert_eq!(target.currency, CurrencyCode::new("EUR"));
}

#[test]
fn cross_currency_transfer_falls_back_to_the_converter() {
    let mut fx = Fixture::new();
    let outcome = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.euro.id, dec!(100))
            .at(at(2024, 1, 15, 12, 0)),
    )
    .expect("transfer");
    assert_eq!(fx.account(&fx.euro).balance, dec!(90));
    assert_eq!(outcome.transaction.exchange_rate, Some(dec!(0.9)));
}

#[test]
fn same_currency_transfer_credits_the_debited_amount() {
    let mut fx = Fixture::new();
    let outcome = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.savings.id, dec!(200))
            .with_target_amount(dec!(999)),
    )
    .expect("transfer");
    assert_eq!(fx.account(&fx.checking).balance, dec!(800));
    assert_eq!(fx.account(&fx.savings).balance, dec!(200));
    assert_eq!(outcome.transaction.exchange_rate, None);
}

#[test]
fn deleting_either_leg_removes_the_whole_transfer() {
    let mut fx = Fixture::new();
    let outcome = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.savings.id, dec!(250)),
    )
    .expect("transfer");
    let target_id = outcome.linked.as_ref().expect("target").id;

    let deleted = TransactionProcessor::delete(&mut fx.store, &fx.fx, fx.user, target_id)
        .expect("delete target leg");
    assert!(deleted.transaction.is_deleted);
    assert!(deleted.linked.as_ref().expect("cascaded").is_deleted);
    assert_eq!(fx.account(&fx.checking).balance, dec!(1000));
    assert_eq!(fx.account(&fx.savings).balance, dec!(0));

    let err = TransactionProcessor::delete(&mut fx.store, &fx.fx, fx.user, outcome.transaction.id)
        .expect_err("already deleted");
    assert!(matches!(err, CoreError::InvalidTransaction(_)));
    assert!(LedgerAudit::run(&fx.store, &fx.fx).expect("audit").is_clean());
}

#[test]
fn direct_transaction_can_become_a_transfer_and_back() {
    let mut fx = Fixture::new();
    let created = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(100), fx.groceries.id),
    )
    .expect("expense");
    let id = created.transaction.id;

    let promoted = TransactionProcessor::update(
        &mut fx.store,
        &fx.fx,
        fx.user,
        id,
        TransactionDraft::transfer(fx.checking.id, fx.savings.id, dec!(100)),
    )
    .expect("promote");
    assert!(promoted.transaction.is_transfer);
    assert_eq!(promoted.transaction.category_id, None);
    let target_id = promoted.linked.as_ref().expect("new target leg").id;
    assert_eq!(fx.account(&fx.checking).balance, dec!(900));
    assert_eq!(fx.account(&fx.savings).balance, dec!(100));
    assert!(LedgerAudit::run(&fx.store, &fx.fx).expect("audit").is_clean());

    let demoted = TransactionProcessor::update(
        &mut fx.store,
        &fx.fx,
        fx.user,
        id,
        TransactionDraft::expense(fx.checking.id, dec!(40), fx.rent.id),
    )
    .expect("demote");
    assert!(!demoted.transaction.is_transfer);
    assert_eq!(demoted.transaction.linked_transaction_id, None);
    assert_eq!(demoted.linked, None);
    assert_eq!(fx.account(&fx.checking).balance, dec!(960));
    assert_eq!(fx.account(&fx.savings).balance, dec!(0));
    let orphan = fx
        .store
        .transaction(target_id)
        .expect("lookup")
        .expect("row kept");
    assert!(orphan.is_deleted);
    assert!(LedgerAudit::run(&fx.store, &fx.fx).expect("audit").is_clean());
}

#[test]
fn transfer_legs_can_be_rewritten_in_place() {
    let mut fx = Fixture::new();
    let outcome = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.savings.id, dec!(100)),
    )
    .expect("transfer");
    let target_id = outcome.linked.as_ref().expect("target").id;

    let moved = TransactionProcessor::update(
        &mut fx.store,
        &fx.fx,
        fx.user,
        outcome.transaction.id,
        TransactionDraft::transfer(fx.checking.id, fx.euro.id, dec!(50)).with_exchange_rate(dec!(0.8)),
    )
    .expect("retarget");
    let target = moved.linked.as_ref().expect("target");
    assert_eq!(target.id, target_id);
    assert_eq!(target.account_id, fx.euro.id);
    assert_eq!(target.amount, dec!(40.0));
    assert_eq!(fx.account(&fx.checking).balance, dec!(950));
    assert_eq!(fx.account(&fx.savings).balance, dec!(0));
    assert_eq!(fx.account(&fx.euro).balance, dec!(40));
    assert_eq!(fx.store.transaction_count(), 2);
}

#[test]
fn category_polarity_must_match() {
    let mut fx = Fixture::new();
    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(10), fx.salary.id),
    )
    .expect_err("income category on expense");
    assert!(matches!(err, CoreError::InvalidCategory(_)));
    assert_eq!(fx.account(&fx.checking).balance, dec!(1000));
    assert_eq!(fx.store.transaction_count(), 0);
}

#[test]
fn foreign_and_missing_accounts_are_rejected() {
    let mut fx = Fixture::new();
    let stranger = fx
        .store
        .insert_account(Account::new(UserId::new(), "Other", common::usd(), dec!(5)))
        .expect("stranger");

    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, stranger.id, dec!(10)),
    )
    .expect_err("foreign target");
    assert!(matches!(err, CoreError::AccessDenied(_)));

    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(AccountId(404), dec!(10), fx.groceries.id),
    )
    .expect_err("missing account");
    assert!(matches!(err, CoreError::InvalidAccount(AccountId(404))));
    assert_eq!(fx.account(&fx.checking).balance, dec!(1000));
}

#[test]
fn failed_conversion_leaves_no_partial_transfer() {
    let mut fx = Fixture::new();
    let pounds = fx
        .store
        .insert_account(Account::new(fx.user, "Pounds", CurrencyCode::new("GBP"), Decimal::ZERO))
        .expect("pounds");
    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, pounds.id, dec!(10)),
    )
    .expect_err("no GBP rate");
    assert!(matches!(err, CoreError::Conversion { .. }));
    assert_eq!(fx.account(&fx.checking).balance, dec!(1000));
    assert_eq!(fx.store.transaction_count(), 0);
}

#[test]
fn malformed_drafts_are_rejected_before_touching_storage() {
    let mut fx = Fixture::new();
    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::expense(fx.checking.id, dec!(-1), fx.groceries.id),
    )
    .expect_err("negative");
    assert!(matches!(err, CoreError::InvalidTransaction(_)));

    let err = TransactionProcessor::create(
        &mut fx.store,
        &fx.fx,
        fx.user,
        TransactionDraft::transfer(fx.checking.id, fx.checking.id, dec!(1)),
    )
    .expect_err("self transfer");
    assert!(matches!(err, CoreError::InvalidTransaction(_)));
}
