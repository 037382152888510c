use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder, Sqlite};

use super::{
    model::{Account, AccountPatch, NewAccount, Transaction, TransactionType},
    validator::next_balance,
};
use crate::error::AccountError;

/// Persistence contract the account service is written against.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError>;

    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountError>;

    /// Writes every set field of `patch` in one statement and bumps `updated_at`.
    async fn update_fields(
        &self,
        identifier: &str,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, AccountError>;

    async fn delete_by_identifier(&self, identifier: &str) -> Result<(), AccountError>;

    /// Appends a ledger entry and moves the balance by its signed amount as one unit.
    ///
    /// The write only happens while the account is active and, for withdrawals, while
    /// `balance - amount >= minimum_balance`. `None` means the guard rejected it and
    /// nothing was persisted.
    async fn post_transaction(
        &self,
        identifier: &str,
        kind: TransactionType,
        amount: Decimal,
    ) -> Result<Option<Account>, AccountError>;

    async fn transactions(&self, bank_account_id: i64) -> Result<Vec<Transaction>, AccountError>;

    fn print_pool_stats(&self) {}
}

/// SQLSTATE raised when a NUMERIC column cannot hold the computed balance.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

fn is_numeric_out_of_range(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE),
        _ => false,
    }
}

/// Pool size and idle count are sampled separately, so idle may briefly exceed size.
fn busy_connections(size: u32, idle: usize) -> u32 {
    size.saturating_sub(u32::try_from(idle).unwrap_or(u32::MAX))
}

const ACCOUNT_COLUMNS: &str = "id, account_id, first_name, last_name, balance, minimum_balance, active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    bank_account_id: i64,
    amount: Decimal,
    kind: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AccountError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            bank_account_id: row.bank_account_id,
            amount: row.amount,
            kind: row
                .kind
                .parse()
                .map_err(|e: String| AccountError::Database(sqlx::Error::Decode(e.into())))?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl AccountStore for sqlx::PgPool {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bank_account WHERE account_id = $1"
        ))
        .bind(identifier)
        .fetch_optional(self)
        .await
        .map_err(AccountError::from_db)
    }

    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountError> {
        let now = Utc::now();
        sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO bank_account
                (account_id, first_name, last_name, balance, minimum_balance, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(&account.account_id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.balance)
        .bind(account.minimum_balance)
        .bind(account.active)
        .bind(now)
        .fetch_one(self)
        .await
        .map_err(AccountError::from_db)
    }

    async fn update_fields(
        &self,
        identifier: &str,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, AccountError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE bank_account SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(first_name) = &patch.first_name {
            builder.push(", first_name = ").push_bind(first_name.clone());
        }
        if let Some(last_name) = &patch.last_name {
            builder.push(", last_name = ").push_bind(last_name.clone());
        }
        if let Some(active) = patch.active {
            builder.push(", active = ").push_bind(active);
        }
        if let Some(balance) = patch.balance {
            builder.push(", balance = ").push_bind(balance);
        }
        if let Some(minimum_balance) = patch.minimum_balance {
            builder.push(", minimum_balance = ").push_bind(minimum_balance);
        }
        builder
            .push(" WHERE account_id = ")
            .push_bind(identifier.to_string())
            .push(format!(" RETURNING {ACCOUNT_COLUMNS}"));

        builder
            .build_query_as::<Account>()
            .fetch_optional(self)
            .await
            .map_err(AccountError::from_db)
    }

    async fn delete_by_identifier(&self, identifier: &str) -> Result<(), AccountError> {
        sqlx::query("DELETE FROM bank_account WHERE account_id = $1")
            .bind(identifier)
            .execute(self)
            .await
            .map_err(AccountError::from_db)?;
        Ok(())
    }

    async fn post_transaction(
        &self,
        identifier: &str,
        kind: TransactionType,
        amount: Decimal,
    ) -> Result<Option<Account>, AccountError> {
        let now = Utc::now();
        let mut tx = self.begin().await.map_err(AccountError::from_db)?;

        let updated = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE bank_account
            SET balance = balance + $1, updated_at = $2
            WHERE account_id = $3
              AND active
              AND ($4 OR balance + $1 >= minimum_balance)
            RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(kind.signed(amount))
        .bind(now)
        .bind(identifier)
        .bind(kind == TransactionType::Deposit)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_numeric_out_of_range(&e) {
                AccountError::AmountOutOfRange {
                    identifier: identifier.to_string(),
                    amount,
                }
            } else {
                AccountError::from_db(e)
            }
        })?;

        // Dropping `tx` here rolls back.
        let Some(account) = updated else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO bank_transaction (bank_account_id, amount, type, created_at)
            VALUES ($1, $2, $3, $4)"#,
        )
        .bind(account.id)
        .bind(amount)
        .bind(kind.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AccountError::from_db)?;

        tx.commit().await.map_err(AccountError::from_db)?;
        Ok(Some(account))
    }

    async fn transactions(&self, bank_account_id: i64) -> Result<Vec<Transaction>, AccountError> {
        sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, bank_account_id, amount, type AS kind, created_at
            FROM bank_transaction
            WHERE bank_account_id = $1
            ORDER BY created_at, id"#,
        )
        .bind(bank_account_id)
        .fetch_all(self)
        .await
        .map_err(AccountError::from_db)?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    fn print_pool_stats(&self) {
        tracing::debug!(
            total = self.size(),
            idle = self.num_idle(),
            active = busy_connections(self.size(), self.num_idle()),
            "db pool stats"
        );
    }
}

// SQLite has no exact decimal type; amounts live in TEXT columns in canonical form.

#[derive(sqlx::FromRow)]
struct SqliteAccountRow {
    id: i64,
    account_id: String,
    first_name: String,
    last_name: String,
    balance: String,
    minimum_balance: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SqliteTransactionRow {
    id: i64,
    bank_account_id: i64,
    amount: String,
    kind: String,
    created_at: DateTime<Utc>,
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, AccountError> {
    raw.parse::<Decimal>().map_err(|e| {
        AccountError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

impl TryFrom<SqliteAccountRow> for Account {
    type Error = AccountError;

    fn try_from(row: SqliteAccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            balance: parse_decimal("balance", &row.balance)?,
            minimum_balance: parse_decimal("minimum_balance", &row.minimum_balance)?,
            account_id: row.account_id,
            first_name: row.first_name,
            last_name: row.last_name,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<SqliteTransactionRow> for Transaction {
    type Error = AccountError;

    fn try_from(row: SqliteTransactionRow) -> Result<Self, Self::Error> {
        TransactionRow {
            id: row.id,
            bank_account_id: row.bank_account_id,
            amount: parse_decimal("amount", &row.amount)?,
            kind: row.kind,
            created_at: row.created_at,
        }
        .try_into()
    }
}

async fn sqlite_find<'e, E>(executor: E, identifier: &str) -> Result<Option<Account>, AccountError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, SqliteAccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM bank_account WHERE account_id = ?1"
    ))
    .bind(identifier)
    .fetch_optional(executor)
    .await
    .map_err(AccountError::from_db)?
    .map(Account::try_from)
    .transpose()
}

#[async_trait]
impl AccountStore for sqlx::SqlitePool {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        sqlite_find(self, identifier).await
    }

    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountError> {
        let now = Utc::now();
        sqlx::query_as::<_, SqliteAccountRow>(&format!(
            r#"
            INSERT INTO bank_account
                (account_id, first_name, last_name, balance, minimum_balance, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(&account.account_id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.balance.to_string())
        .bind(account.minimum_balance.to_string())
        .bind(account.active)
        .bind(now)
        .fetch_one(self)
        .await
        .map_err(AccountError::from_db)?
        .try_into()
    }

    async fn update_fields(
        &self,
        identifier: &str,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, AccountError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE bank_account SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(first_name) = &patch.first_name {
            builder.push(", first_name = ").push_bind(first_name.clone());
        }
        if let Some(last_name) = &patch.last_name {
            builder.push(", last_name = ").push_bind(last_name.clone());
        }
        if let Some(active) = patch.active {
            builder.push(", active = ").push_bind(active);
        }
        if let Some(balance) = patch.balance {
            builder.push(", balance = ").push_bind(balance.to_string());
        }
        if let Some(minimum_balance) = patch.minimum_balance {
            builder
                .push(", minimum_balance = ")
                .push_bind(minimum_balance.to_string());
        }
        builder
            .push(" WHERE account_id = ")
            .push_bind(identifier.to_string())
            .push(format!(" RETURNING {ACCOUNT_COLUMNS}"));

        builder
            .build_query_as::<SqliteAccountRow>()
            .fetch_optional(self)
            .await
            .map_err(AccountError::from_db)?
            .map(Account::try_from)
            .transpose()
    }

    async fn delete_by_identifier(&self, identifier: &str) -> Result<(), AccountError> {
        let mut tx = self.begin().await.map_err(AccountError::from_db)?;
        sqlx::query(
            r#"
            DELETE FROM bank_transaction
            WHERE bank_account_id IN (SELECT id FROM bank_account WHERE account_id = ?1)"#,
        )
        .bind(identifier)
        .execute(&mut *tx)
        .await
        .map_err(AccountError::from_db)?;
        sqlx::query("DELETE FROM bank_account WHERE account_id = ?1")
            .bind(identifier)
            .execute(&mut *tx)
            .await
            .map_err(AccountError::from_db)?;
        tx.commit().await.map_err(AccountError::from_db)
    }

    async fn post_transaction(
        &self,
        identifier: &str,
        kind: TransactionType,
        amount: Decimal,
    ) -> Result<Option<Account>, AccountError> {
        let now = Utc::now();
        let mut tx = self.begin().await.map_err(AccountError::from_db)?;

        // Take the write lock before reading so concurrent posts queue on the busy
        // timeout instead of failing a read-to-write upgrade with SQLITE_BUSY.
        sqlx::query("UPDATE bank_account SET updated_at = updated_at WHERE account_id = ?1")
            .bind(identifier)
            .execute(&mut *tx)
            .await
            .map_err(AccountError::from_db)?;

        let Some(current) = sqlite_find(&mut *tx, identifier).await? else {
            return Ok(None);
        };
        let balance = next_balance(&current, kind, amount)?;
        if !current.active
            || (kind == TransactionType::Withdraw && balance < current.minimum_balance)
        {
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO bank_transaction (bank_account_id, amount, type, created_at)
            VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(current.id)
        .bind(amount.to_string())
        .bind(kind.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AccountError::from_db)?;

        let updated: Account = sqlx::query_as::<_, SqliteAccountRow>(&format!(
            r#"
            UPDATE bank_account SET balance = ?1, updated_at = ?2
            WHERE id = ?3
            RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(balance.to_string())
        .bind(now)
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AccountError::from_db)?
        .try_into()?;

        tx.commit().await.map_err(AccountError::from_db)?;
        Ok(Some(updated))
    }

    async fn transactions(&self, bank_account_id: i64) -> Result<Vec<Transaction>, AccountError> {
        sqlx::query_as::<_, SqliteTransactionRow>(
            r#"
            SELECT id, bank_account_id, amount, type AS kind, created_at
            FROM bank_transaction
            WHERE bank_account_id = ?1
            ORDER BY id"#,
        )
        .bind(bank_account_id)
        .fetch_all(self)
        .await
        .map_err(AccountError::from_db)?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    fn print_pool_stats(&self) {
        tracing::debug!(
            total = self.size(),
            idle = self.num_idle(),
            active = busy_connections(self.size(), self.num_idle()),
            "db pool stats"
        );
    }
}
