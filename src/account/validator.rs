use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::model::{Account, TransactionType};
use crate::error::AccountError;

static ACCOUNT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+$").expect("Invalid account id regex pattern")
});

/// True when `identifier` is NOT shaped like `local-part@domain`.
pub fn is_malformed_identifier(identifier: &str) -> bool {
    !ACCOUNT_ID_PATTERN.is_match(identifier)
}

pub fn validate_identifier(identifier: &str) -> Result<(), AccountError> {
    if is_malformed_identifier(identifier) {
        return Err(AccountError::InvalidIdentifierFormat(identifier.to_string()));
    }
    Ok(())
}

pub fn require_exists(account: Option<Account>, identifier: &str) -> Result<Account, AccountError> {
    account.ok_or_else(|| AccountError::AccountNotFound(identifier.to_string()))
}

pub fn require_active(account: &Account) -> Result<(), AccountError> {
    if !account.active {
        return Err(AccountError::InactiveAccount(account.account_id.clone()));
    }
    Ok(())
}

/// A withdrawal may land exactly on the minimum balance, never below it.
pub fn require_sufficient_funds(account: &Account, amount: Decimal) -> Result<(), AccountError> {
    // An overflowing subtraction lies below any representable minimum.
    match account.balance.checked_sub(amount) {
        Some(remaining) if remaining >= account.minimum_balance => Ok(()),
        _ => Err(AccountError::InsufficientFunds {
            identifier: account.account_id.clone(),
            balance: account.balance,
            amount,
            minimum_balance: account.minimum_balance,
        }),
    }
}

pub fn next_balance(
    account: &Account,
    kind: TransactionType,
    amount: Decimal,
) -> Result<Decimal, AccountError> {
    kind.apply_to(account.balance, amount)
        .ok_or_else(|| AccountError::AmountOutOfRange {
            identifier: account.account_id.clone(),
            amount,
        })
}
