use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AccountError;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing)]
    pub id: i64,
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
    pub balance: Decimal,
    pub minimum_balance: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied data for a new account. Accounts start inactive unless asked otherwise.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
    pub balance: Decimal,
    pub minimum_balance: Decimal,
    #[serde(default)]
    pub active: bool,
}

impl NewAccount {
    pub fn new(
        account_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        balance: Decimal,
        minimum_balance: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            balance,
            minimum_balance,
            active: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for Balance {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.balance,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
        }
    }

    /// Balance delta this kind of transaction applies for `amount`.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Deposit => amount,
            TransactionType::Withdraw => -amount,
        }
    }

    /// `balance` after this transaction, or `None` when it leaves the decimal range.
    pub fn apply_to(&self, balance: Decimal, amount: Decimal) -> Option<Decimal> {
        balance.checked_add(self.signed(amount))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAW" => Ok(TransactionType::Withdraw),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub bank_account_id: i64,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// Fields a caller may edit through a field-level update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    FirstName,
    LastName,
    Balance,
    MinimumBalance,
    Active,
}

impl FromStr for AccountField {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firstName" | "first_name" => Ok(AccountField::FirstName),
            "lastName" | "last_name" => Ok(AccountField::LastName),
            "balance" => Ok(AccountField::Balance),
            "minimumBalance" | "minimum_balance" => Ok(AccountField::MinimumBalance),
            "active" => Ok(AccountField::Active),
            other => Err(AccountError::UnauthorizedFieldUpdate(other.to_string())),
        }
    }
}

/// A partial edit of an account. `None` leaves the stored value as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub balance: Option<Decimal>,
    pub minimum_balance: Option<Decimal>,
    pub active: Option<bool>,
}

impl AccountPatch {
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }

    pub fn minimum_balance(minimum_balance: Decimal) -> Self {
        Self {
            minimum_balance: Some(minimum_balance),
            ..Default::default()
        }
    }

    /// Builds a patch from raw `(field, value)` pairs. Later pairs for the same
    /// field overwrite earlier ones. Any bad pair rejects the whole list.
    pub fn from_pairs<F, V>(pairs: &[(F, V)]) -> Result<Self, AccountError>
    where
        F: AsRef<str>,
        V: AsRef<str>,
    {
        let mut patch = AccountPatch::default();
        for (field, value) in pairs {
            patch.set(field.as_ref().parse()?, value.as_ref())?;
        }
        Ok(patch)
    }

    pub fn set(&mut self, field: AccountField, value: &str) -> Result<(), AccountError> {
        let invalid = |name: &str| AccountError::InvalidFieldValue {
            field: name.to_string(),
            value: value.to_string(),
        };
        match field {
            AccountField::FirstName => self.first_name = Some(value.to_string()),
            AccountField::LastName => self.last_name = Some(value.to_string()),
            AccountField::Balance => {
                self.balance = Some(value.trim().parse().map_err(|_| invalid("balance"))?)
            }
            AccountField::MinimumBalance => {
                self.minimum_balance =
                    Some(value.trim().parse().map_err(|_| invalid("minimumBalance"))?)
            }
            AccountField::Active => {
                let flag = match value.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid("active")),
                };
                self.active = Some(flag)
            }
        }
        Ok(())
    }

    /// Applies the patch in place and stamps `updated_at`. `created_at` is never touched.
    pub fn apply(&self, account: &mut Account, now: DateTime<Utc>) {
        if let Some(first_name) = &self.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            account.last_name = last_name.clone();
        }
        if let Some(balance) = self.balance {
            account.balance = balance;
        }
        if let Some(minimum_balance) = self.minimum_balance {
            account.minimum_balance = minimum_balance;
        }
        if let Some(active) = self.active {
            account.active = active;
        }
        account.updated_at = now;
    }
}
