use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{
    model::{Account, AccountPatch, NewAccount, Transaction, TransactionType},
    repository::AccountStore,
    validator::next_balance,
};
use crate::error::AccountError;

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    ledger: Vec<Transaction>,
    next_account_id: i64,
    next_transaction_id: i64,
}

/// Process-local store. Every mutating call is counted, successful or not.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.state.lock().await.accounts.get(identifier).cloned())
    }

    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountError> {
        self.record_write();
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.account_id) {
            return Err(AccountError::StorageIntegrity(format!(
                "duplicate key value violates unique constraint on account_id '{}'",
                account.account_id
            )));
        }

        state.next_account_id += 1;
        let now = Utc::now();
        let created = Account {
            id: state.next_account_id,
            account_id: account.account_id.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            balance: account.balance,
            minimum_balance: account.minimum_balance,
            active: account.active,
            created_at: now,
            updated_at: now,
        };
        state
            .accounts
            .insert(created.account_id.clone(), created.clone());
        Ok(created)
    }

    async fn update_fields(
        &self,
        identifier: &str,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, AccountError> {
        self.record_write();
        let mut state = self.state.lock().await;
        Ok(state.accounts.get_mut(identifier).map(|account| {
            patch.apply(account, Utc::now());
            account.clone()
        }))
    }

    async fn delete_by_identifier(&self, identifier: &str) -> Result<(), AccountError> {
        self.record_write();
        let mut state = self.state.lock().await;
        if let Some(removed) = state.accounts.remove(identifier) {
            state.ledger.retain(|tx| tx.bank_account_id != removed.id);
        }
        Ok(())
    }

    async fn post_transaction(
        &self,
        identifier: &str,
        kind: TransactionType,
        amount: Decimal,
    ) -> Result<Option<Account>, AccountError> {
        self.record_write();
        let mut state = self.state.lock().await;
        let Some(current) = state.accounts.get(identifier) else {
            return Ok(None);
        };
        let balance = next_balance(current, kind, amount)?;
        if !current.active
            || (kind == TransactionType::Withdraw && balance < current.minimum_balance)
        {
            return Ok(None);
        }
        let bank_account_id = current.id;

        let now = Utc::now();
        state.next_transaction_id += 1;
        let id = state.next_transaction_id;
        state.ledger.push(Transaction {
            id,
            bank_account_id,
            amount,
            kind,
            created_at: now,
        });

        Ok(state.accounts.get_mut(identifier).map(|account| {
            account.balance = balance;
            account.updated_at = now;
            account.clone()
        }))
    }

    async fn transactions(&self, bank_account_id: i64) -> Result<Vec<Transaction>, AccountError> {
        Ok(self
            .state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|tx| tx.bank_account_id == bank_account_id)
            .cloned()
            .collect())
    }
}
