use std::sync::Arc;

use bank_management::{
    account::{AccountService, AccountStore, NewAccount, TransactionType},
    config::Config,
    db::Database,
    error::AccountError,
};
use common::{FRANKLIN, THEODORE, ledger_size, seeded_service, setup_test_db};
use rand::Rng;
use rust_decimal::Decimal;
mod common;

fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

#[tokio::test]
async fn withdraw_to_exact_minimum_then_fail() {
    let (pool, service) = seeded_service().await;

    let account = service.withdraw(THEODORE, dec(2000)).await.unwrap();
    assert_eq!(account.balance, dec(1500));
    assert_eq!(account.minimum_balance, dec(1500));
    assert_eq!(ledger_size(&pool).await, 1);

    let err = service.withdraw(THEODORE, dec(1)).await.unwrap_err();
    assert!(matches!(err, AccountError::InsufficientFunds { .. }));

    // A rejected withdrawal touches neither the balance nor the ledger.
    let stored = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();
    assert_eq!(stored.balance, dec(1500));
    assert_eq!(ledger_size(&pool).await, 1);
}

#[tokio::test]
async fn withdraw_more_than_allowed_is_rejected_up_front() {
    let (pool, service) = seeded_service().await;

    let err = service.withdraw(THEODORE, dec(2001)).await.unwrap_err();

    assert!(matches!(err, AccountError::InsufficientFunds { .. }));
    assert_eq!(ledger_size(&pool).await, 0);
}

#[tokio::test]
async fn deposit_adds_amount_and_one_ledger_entry() {
    let (pool, service) = seeded_service().await;

    let account = service.deposit(THEODORE, dec(50)).await.unwrap();

    assert_eq!(account.first_name, "Theodore");
    assert_eq!(account.last_name, "Roosevelt");
    assert_eq!(account.balance, dec(3550));
    assert_eq!(account.minimum_balance, dec(1500));

    let history = service.transaction_history(THEODORE).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionType::Deposit);
    assert_eq!(history[0].amount, dec(50));
    assert_eq!(history[0].bank_account_id, account.id);
    assert_eq!(ledger_size(&pool).await, 1);
}

#[tokio::test]
async fn repeated_withdrawals_and_deposits_accumulate() {
    let (_, service) = seeded_service().await;

    for _ in 0..3 {
        service.withdraw(THEODORE, dec(100)).await.unwrap();
    }
    service.deposit(THEODORE, dec(1000)).await.unwrap();
    service.withdraw(THEODORE, dec(100)).await.unwrap();
    service.withdraw(THEODORE, dec(100)).await.unwrap();
    let account = service.withdraw(THEODORE, dec(1)).await.unwrap();

    assert_eq!(account.balance, dec(3999));
    let kinds: Vec<TransactionType> = service
        .transaction_history(THEODORE)
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.kind)
        .collect();
    assert_eq!(kinds.len(), 7);
    assert_eq!(kinds[3], TransactionType::Deposit);
    assert_eq!(
        kinds.iter().filter(|k| **k == TransactionType::Withdraw).count(),
        6
    );
}

#[tokio::test]
async fn deposit_then_withdraw_restores_balance_for_random_amounts() {
    let (_, service) = seeded_service().await;
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let cents: i64 = rng.gen_range(1..=200_000);
        let amount = Decimal::new(cents, 2);

        service.deposit(THEODORE, amount).await.unwrap();
        let account = service.withdraw(THEODORE, amount).await.unwrap();

        assert_eq!(account.balance, dec(3500), "amount {}", amount);
    }
}

#[tokio::test]
async fn inactive_account_rejects_deposit_and_withdraw() {
    let (pool, service) = seeded_service().await;

    assert!(matches!(
        service.deposit(FRANKLIN, dec(10)).await,
        Err(AccountError::InactiveAccount(_))
    ));
    assert!(matches!(
        service.withdraw(FRANKLIN, dec(10)).await,
        Err(AccountError::InactiveAccount(_))
    ));
    assert_eq!(ledger_size(&pool).await, 0);
}

#[tokio::test]
async fn missing_account_produces_no_ledger_entry() {
    let (pool, service) = seeded_service().await;

    assert!(matches!(
        service.deposit("fake@gmail.com", dec(50)).await,
        Err(AccountError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.withdraw("fake@gmail.com", dec(50)).await,
        Err(AccountError::AccountNotFound(_))
    ));
    assert_eq!(ledger_size(&pool).await, 0);
}

#[tokio::test]
async fn activate_and_deactivate() {
    let (_, service) = seeded_service().await;

    let before = service.get_account(FRANKLIN).await.unwrap();
    assert!(!before.active);

    let activated = service.activate_account(FRANKLIN).await.unwrap();
    assert!(activated.active);
    assert_eq!(activated.created_at, before.created_at);

    let again = service.activate_account(FRANKLIN).await.unwrap();
    assert_eq!(again, activated);

    let deactivated = service.deactivate_account(THEODORE).await.unwrap();
    assert!(!deactivated.active);

    assert!(matches!(
        service.activate_account("fake@gmail.com").await,
        Err(AccountError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn activate_on_active_account_does_not_write() {
    let (_, service) = seeded_service().await;
    let before = service.get_account(THEODORE).await.unwrap();

    let after = service.activate_account(THEODORE).await.unwrap();

    assert_eq!(after.balance, before.balance);
    assert_eq!(after.minimum_balance, before.minimum_balance);
    assert!(after.active);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn delete_removes_account_and_ledger_and_is_idempotent() {
    let (pool, service) = seeded_service().await;
    service.deposit(THEODORE, dec(10)).await.unwrap();
    assert_eq!(ledger_size(&pool).await, 1);

    service.delete_account(THEODORE).await.unwrap();
    service.delete_account(THEODORE).await.unwrap();
    service.delete_account("never.existed@gmail.com").await.unwrap();

    assert!(pool.find_by_identifier(THEODORE).await.unwrap().is_none());
    assert_eq!(ledger_size(&pool).await, 0);
    assert!(pool.find_by_identifier(FRANKLIN).await.unwrap().is_some());
}

#[tokio::test]
async fn duplicate_account_is_a_storage_integrity_failure() {
    let (_, service) = seeded_service().await;

    let duplicate = NewAccount::new(THEODORE, "Someone", "Else", dec(0), dec(0));
    let err = service.create_account(&duplicate).await.unwrap_err();

    assert!(matches!(err, AccountError::StorageIntegrity(_)));
}

#[tokio::test]
async fn create_account_keeps_exact_decimals() {
    let pool = setup_test_db().await;
    let service = bank_management::account::AccountService::new(std::sync::Arc::new(pool));

    let created = service
        .create_account(&NewAccount::new(
            "john.adams@gmail.com",
            "John",
            "Adams",
            Decimal::new(123_456_789, 4),
            Decimal::new(-5000_5, 1),
        ))
        .await
        .unwrap();

    assert!(!created.active);
    assert_eq!(created.balance.to_string(), "12345.6789");
    assert_eq!(created.minimum_balance, Decimal::new(-50005, 1));

    let fetched = service.get_account("john.adams@gmail.com").await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn field_update_persists_whitelisted_fields() {
    let (pool, service) = seeded_service().await;
    let before = service.get_account(THEODORE).await.unwrap();

    let updated = service
        .update_fields(
            THEODORE,
            &[
                ("firstName", "Teddy"),
                ("balance", "1234.5678"),
                ("firstName", "Ted"),
            ],
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.first_name, "Ted");
    assert_eq!(updated.balance, Decimal::new(12345678, 4));
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.updated_at >= before.updated_at);

    let stored = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn field_update_with_forbidden_field_leaves_record_unchanged() {
    let (pool, service) = seeded_service().await;
    let before = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();

    let err = service
        .update_fields(THEODORE, &[("lastName", "Changed"), ("accountId", "x@y.com")])
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::UnauthorizedFieldUpdate(_)));
    let after = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn field_update_and_credit_limit_on_missing_account_are_empty() {
    let (_, service) = seeded_service().await;

    assert!(
        service
            .update_fields("fake@gmail.com", &[("firstName", "Nobody")])
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        service
            .update_credit_limit("fake@gmail.com", dec(-100))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn credit_limit_change_moves_the_withdraw_floor() {
    let (_, service) = seeded_service().await;

    let account = service
        .update_credit_limit(THEODORE, dec(-1000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.minimum_balance, dec(-1000));

    let account = service.withdraw(THEODORE, dec(4500)).await.unwrap();
    assert_eq!(account.balance, dec(-1000));
    assert!(matches!(
        service.withdraw(THEODORE, Decimal::new(1, 2)).await,
        Err(AccountError::InsufficientFunds { .. })
    ));
}

#[tokio::test]
async fn store_guard_rejects_write_that_bypassed_checks() {
    let (pool, _) = seeded_service().await;

    let rejected = pool
        .post_transaction(THEODORE, TransactionType::Withdraw, dec(2001))
        .await
        .unwrap();
    assert!(rejected.is_none());

    let rejected = pool
        .post_transaction(FRANKLIN, TransactionType::Deposit, dec(1))
        .await
        .unwrap();
    assert!(rejected.is_none());

    assert_eq!(ledger_size(&pool).await, 0);
    let theodore = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();
    assert_eq!(theodore.balance, dec(3500));
}

#[tokio::test]
async fn deposit_beyond_decimal_range_is_a_typed_error() {
    let (pool, service) = seeded_service().await;

    let err = service.deposit(THEODORE, Decimal::MAX).await.unwrap_err();
    assert!(matches!(err, AccountError::AmountOutOfRange { .. }));

    let err = pool
        .post_transaction(THEODORE, TransactionType::Deposit, Decimal::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::AmountOutOfRange { .. }));

    let theodore = pool.find_by_identifier(THEODORE).await.unwrap().unwrap();
    assert_eq!(theodore.balance, dec(3500));
    assert_eq!(ledger_size(&pool).await, 0);
}

#[tokio::test]
async fn withdraw_of_max_amount_from_overdrawn_account_is_rejected() {
    let (pool, service) = seeded_service().await;
    service
        .update_credit_limit(THEODORE, dec(-5000))
        .await
        .unwrap()
        .unwrap();
    service.withdraw(THEODORE, dec(4000)).await.unwrap();

    let err = service.withdraw(THEODORE, Decimal::MAX).await.unwrap_err();

    assert!(matches!(err, AccountError::InsufficientFunds { .. }));
    assert_eq!(ledger_size(&pool).await, 1);
}

#[tokio::test]
async fn concurrent_posts_on_a_shared_sqlite_file_all_succeed() {
    let path = std::env::temp_dir().join(format!(
        "bank-management-{}.db",
        rand::random::<u64>()
    ));
    let config = Config {
        max_connections: 4,
        min_connections: 1,
        ..Config::with_database_url(format!("sqlite://{}", path.display()))
    };
    let store = Database::connect(&config).await.unwrap();
    let mut theodore = NewAccount::new(THEODORE, "Theodore", "Roosevelt", dec(3500), dec(1500));
    theodore.active = true;
    store.insert(&theodore).await.unwrap();
    let service = AccountService::new(Arc::clone(&store));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    service.deposit(THEODORE, dec(2)).await
                } else {
                    service.withdraw(THEODORE, dec(1)).await
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let account = service.get_account(THEODORE).await.unwrap();
    assert_eq!(account.balance, dec(3510));
    assert_eq!(service.transaction_history(THEODORE).await.unwrap().len(), 20);

    drop(service);
    drop(store);
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}
