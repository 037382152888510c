use std::sync::Arc;

use sqlx::{
    PgPool, SqlitePool,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tracing::info;

use crate::{
    account::{memory::MemoryStore, repository::AccountStore},
    config::Config,
};

const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bank_account (
    id BIGSERIAL PRIMARY KEY,
    account_id TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    balance NUMERIC(19, 4) NOT NULL,
    minimum_balance NUMERIC(19, 4) NOT NULL,
    active BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS bank_transaction (
    id BIGSERIAL PRIMARY KEY,
    bank_account_id BIGINT NOT NULL REFERENCES bank_account (id) ON DELETE CASCADE,
    amount NUMERIC(19, 4) NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('DEPOSIT', 'WITHDRAW')),
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS bank_transaction_account_idx ON bank_transaction (bank_account_id);
"#;

const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bank_account (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    balance TEXT NOT NULL,
    minimum_balance TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS bank_transaction (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bank_account_id INTEGER NOT NULL REFERENCES bank_account (id) ON DELETE CASCADE,
    amount TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('DEPOSIT', 'WITHDRAW')),
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS bank_transaction_account_idx ON bank_transaction (bank_account_id);
"#;

pub struct Database;

impl Database {
    /// Opens the store named by `DATABASE_URL` and makes sure its tables exist.
    ///
    /// `postgres://` and `postgresql://` open a PostgreSQL pool, `sqlite:` a SQLite pool
    /// and `memory:` a process-local store that is lost on exit.
    pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn AccountStore>> {
        let url = config.database_url.as_str();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout)
                .connect(url)
                .await?;
            Self::init_postgres(&pool).await?;
            info!("connected to postgres");
            Ok(Arc::new(pool))
        } else if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?
                .create_if_missing(true)
                .foreign_keys(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout)
                .connect_with(options)
                .await?;
            Self::init_sqlite(&pool).await?;
            info!("connected to sqlite");
            Ok(Arc::new(pool))
        } else if url.starts_with("memory:") {
            info!("using in-memory account store");
            Ok(Arc::new(MemoryStore::new()))
        } else {
            anyhow::bail!("unsupported DATABASE_URL scheme: {}", url)
        }
    }

    pub async fn init_postgres(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(POSTGRES_SCHEMA).execute(pool).await?;
        Ok(())
    }

    pub async fn init_sqlite(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SQLITE_SCHEMA).execute(pool).await?;
        Ok(())
    }
}
