use std::sync::Arc;

use bank_management::{
    account::{AccountService, AccountStore, NewAccount},
    db::Database,
};
use rust_decimal::Decimal;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub const THEODORE: &str = "theodore.roosevelt@gmail.com";
pub const FRANKLIN: &str = "franklin.benjamin@gmail.com";

pub async fn setup_test_db() -> SqlitePool {
    // A single connection that never idles out keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite DB");

    Database::init_sqlite(&pool)
        .await
        .expect("Failed to create test tables");

    pool
}

/// Theodore: active, balance 3500, minimum 1500. Franklin: inactive, balance 1000, minimum 100.
pub async fn seed_accounts(pool: &SqlitePool) {
    let mut theodore = NewAccount::new(
        THEODORE,
        "Theodore",
        "Roosevelt",
        Decimal::from(3500),
        Decimal::from(1500),
    );
    theodore.active = true;
    pool.insert(&theodore)
        .await
        .expect("Failed to insert test account");

    let franklin = NewAccount::new(
        FRANKLIN,
        "Benjamin",
        "Franklin",
        Decimal::from(1000),
        Decimal::from(100),
    );
    pool.insert(&franklin)
        .await
        .expect("Failed to insert test account");
}

pub async fn seeded_service() -> (SqlitePool, AccountService) {
    let pool = setup_test_db().await;
    seed_accounts(&pool).await;
    let service = AccountService::new(Arc::new(pool.clone()));
    (pool, service)
}

pub async fn ledger_size(pool: &SqlitePool) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bank_transaction")
        .fetch_one(pool)
        .await
        .expect("Failed to count transactions");
    row.0
}
