//! Ownership and existence checks shared by the services.

use ledgerline_domain::{Account, AccountId, Category, CategoryId, Owned, UserId};
use rust_decimal::Decimal;

use crate::{store::LedgerStore, CoreError, CoreResult};

pub(crate) fn ensure_owner(entity: &impl Owned, user: UserId, what: &str) -> CoreResult<()> {
    if entity.is_owned_by(user) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied(format!("{} belongs to another user", what)))
    }
}

/// Loads a live account owned by `user`.
pub(crate) fn owned_account<S: LedgerStore>(
    store: &S,
    id: AccountId,
    user: UserId,
) -> CoreResult<Account> {
    let account = store
        .account(id)?
        .filter(Account::is_live)
        .ok_or(CoreError::InvalidAccount(id))?;
    ensure_owner(&account, user, &id.to_string())?;
    Ok(account)
}

/// Loads a live category owned by `user` whose polarity matches `is_income`.
pub(crate) fn matching_category<S: LedgerStore>(
    store: &S,
    id: Option<CategoryId>,
    is_income: bool,
    user: UserId,
) -> CoreResult<Category> {
    let id = id.ok_or_else(|| CoreError::InvalidCategory("category is required".into()))?;
    let category = store
        .category(id)?
        .filter(Category::is_live)
        .ok_or_else(|| CoreError::invalid_category(id))?;
    ensure_owner(&category, user, &id.to_string())?;
    if category.is_income != is_income {
        return Err(CoreError::InvalidCategory(format!(
            "{} is an {} category",
            id,
            if category.is_income { "income" } else { "expense" }
        )));
    }
    Ok(category)
}

/// Adds `delta` to an account's running balance.
pub(crate) fn adjust_balance<S: LedgerStore>(
    store: &mut S,
    id: AccountId,
    delta: Decimal,
) -> CoreResult<Account> {
    let mut account = store.account(id)?.ok_or(CoreError::InvalidAccount(id))?;
    account.apply(delta);
    store.save_account(&account)?;
    Ok(account)
}
