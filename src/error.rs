use std::{error::Error, fmt::Debug};

use rust_decimal::Decimal;

#[derive(thiserror::Error)]
pub enum AccountError {
    #[error("Invalid account id format: '{0}'")]
    InvalidIdentifierFormat(String),

    #[error("Bank account '{0}' not found")]
    AccountNotFound(String),

    #[error("Bank account '{0}' is inactive")]
    InactiveAccount(String),

    #[error(
        "Insufficient funds in bank account '{identifier}': balance {balance}, requested {amount}, minimum {minimum_balance}"
    )]
    InsufficientFunds {
        identifier: String,
        balance: Decimal,
        amount: Decimal,
        minimum_balance: Decimal,
    },

    #[error("Amount {amount} is out of range for bank account '{identifier}'")]
    AmountOutOfRange { identifier: String, amount: Decimal },

    #[error("Bank account '{0}' changed while the transaction was being posted")]
    ConcurrentUpdate(String),

    #[error("You are unauthorized to update field '{0}'")]
    UnauthorizedFieldUpdate(String),

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidFieldValue { field: String, value: String },

    #[error("Storage integrity violation: {0}")]
    StorageIntegrity(String),

    #[error("Database query")]
    Database(#[source] sqlx::Error),
}

impl AccountError {
    /// Unique violations become `StorageIntegrity`; everything else is passed through.
    pub fn from_db(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AccountError::StorageIntegrity(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AccountError::StorageIntegrity(db.message().to_string())
            }
            e => AccountError::Database(e),
        }
    }
}

impl Debug for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let Some(source) = self.source() {
            write!(f, " (Caused by: {})", source)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("ENV '{0}' Not Found")]
    EnvError(String, #[source] std::env::VarError),

    #[error("ENV '{0}' has invalid value '{1}'")]
    InvalidValue(String, String),
}
