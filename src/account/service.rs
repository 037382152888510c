use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{
    model::{Account, AccountPatch, Balance, NewAccount, Transaction, TransactionType},
    repository::AccountStore,
    validator::{
        next_balance, require_active, require_exists, require_sufficient_funds,
        validate_identifier,
    },
};
use crate::error::AccountError;

/// Account lifecycle and money movement.
///
/// Checks always run in the same order: identifier format, existence, active
/// status, then funds (withdrawals only), so callers see the most fundamental
/// failure first.
#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountStore>) -> Self {
        AccountService { repository }
    }

    pub fn print_pool_stats(&self) {
        self.repository.print_pool_stats();
    }

    async fn find_existing(&self, account_id: &str) -> Result<Account, AccountError> {
        validate_identifier(account_id)?;
        let account = self.repository.find_by_identifier(account_id).await?;
        require_exists(account, account_id)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, AccountError> {
        info!(account_id, "get bank account");
        self.find_existing(account_id).await
    }

    pub async fn get_balance(&self, account_id: &str) -> Result<Balance, AccountError> {
        info!(account_id, "get balance");
        let account = self.find_existing(account_id).await?;
        Ok(Balance::from(&account))
    }

    pub async fn transaction_history(
        &self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, AccountError> {
        info!(account_id, "get transaction history");
        let account = self.find_existing(account_id).await?;
        self.repository.transactions(account.id).await
    }

    /// Duplicate identifiers come back from the store as `StorageIntegrity`.
    pub async fn create_account(&self, account: &NewAccount) -> Result<Account, AccountError> {
        info!(account_id = %account.account_id, "create bank account");
        validate_identifier(&account.account_id)?;
        self.repository.insert(account).await
    }

    /// Deleting an unknown account is not an error.
    pub async fn delete_account(&self, account_id: &str) -> Result<(), AccountError> {
        info!(account_id, "delete bank account");
        validate_identifier(account_id)?;
        self.repository.delete_by_identifier(account_id).await
    }

    pub async fn activate_account(&self, account_id: &str) -> Result<Account, AccountError> {
        info!(account_id, "activate bank account");
        self.set_active(account_id, true).await
    }

    pub async fn deactivate_account(&self, account_id: &str) -> Result<Account, AccountError> {
        info!(account_id, "deactivate bank account");
        self.set_active(account_id, false).await
    }

    async fn set_active(&self, account_id: &str, active: bool) -> Result<Account, AccountError> {
        let account = self.find_existing(account_id).await?;
        if account.active == active {
            warn!(account_id, active, "active flag already set, nothing to write");
            return Ok(account);
        }
        let updated = self
            .repository
            .update_fields(account_id, &AccountPatch::active(active))
            .await?;
        require_exists(updated, account_id)
    }

    pub async fn deposit(&self, account_id: &str, amount: Decimal) -> Result<Account, AccountError> {
        info!(account_id, %amount, "make deposit");
        let account = self.find_existing(account_id).await?;
        require_active(&account)?;
        next_balance(&account, TransactionType::Deposit, amount)?;
        self.post(account_id, TransactionType::Deposit, amount).await
    }

    pub async fn withdraw(&self, account_id: &str, amount: Decimal) -> Result<Account, AccountError> {
        info!(account_id, %amount, "make withdraw");
        let account = self.find_existing(account_id).await?;
        require_active(&account)?;
        require_sufficient_funds(&account, amount)?;
        self.post(account_id, TransactionType::Withdraw, amount).await
    }

    async fn post(
        &self,
        account_id: &str,
        kind: TransactionType,
        amount: Decimal,
    ) -> Result<Account, AccountError> {
        if let Some(account) = self
            .repository
            .post_transaction(account_id, kind, amount)
            .await?
        {
            return Ok(account);
        }

        // The store guard refused the write; the account changed since it was read.
        warn!(account_id, %kind, %amount, "transaction rejected by store guard");
        let current = self.repository.find_by_identifier(account_id).await?;
        let current = require_exists(current, account_id)?;
        require_active(&current)?;
        match kind {
            TransactionType::Withdraw => require_sufficient_funds(&current, amount)?,
            TransactionType::Deposit => {
                next_balance(&current, kind, amount)?;
            }
        }

        // The account is postable again, so the write is tried once more.
        self.repository
            .post_transaction(account_id, kind, amount)
            .await?
            .ok_or_else(|| AccountError::ConcurrentUpdate(account_id.to_string()))
    }

    /// Applies whitelisted `(field, value)` edits in order. An unknown account yields
    /// `Ok(None)`; a bad field or value rejects the whole list before anything is written.
    pub async fn update_fields<F, V>(
        &self,
        account_id: &str,
        fields: &[(F, V)],
    ) -> Result<Option<Account>, AccountError>
    where
        F: AsRef<str>,
        V: AsRef<str>,
    {
        info!(account_id, count = fields.len(), "update bank account fields");
        validate_identifier(account_id)?;
        let patch = AccountPatch::from_pairs(fields)?;
        self.apply_patch(account_id, &patch).await
    }

    pub async fn update_credit_limit(
        &self,
        account_id: &str,
        minimum_balance: Decimal,
    ) -> Result<Option<Account>, AccountError> {
        info!(account_id, %minimum_balance, "update credit limit");
        validate_identifier(account_id)?;
        self.apply_patch(account_id, &AccountPatch::minimum_balance(minimum_balance))
            .await
    }

    async fn apply_patch(
        &self,
        account_id: &str,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, AccountError> {
        if self.repository.find_by_identifier(account_id).await?.is_none() {
            warn!(account_id, "no bank account to update");
            return Ok(None);
        }
        self.repository.update_fields(account_id, patch).await
    }
}
