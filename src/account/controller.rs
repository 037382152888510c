use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{
    model::NewAccount,
    service::AccountService,
    validator::is_malformed_identifier,
};
use crate::{
    constants::{
        BAD_REQUEST, CONFLICT, CREATED, INTERNAL_ERROR, NO_CONTENT, NOT_FOUND, OK_RESPONSE,
    },
    error::AccountError,
    req::Request,
    utils::{api_error, des_from_str, ser_to_str},
};

/// Body of deposit, withdraw and credit-limit requests.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub account_id: String,
    pub amount: Decimal,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FieldUpdate {
    pub field: String,
    pub value: serde_json::Value,
}

impl FieldUpdate {
    fn into_pair(self) -> (String, String) {
        let value = match self.value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        (self.field, value)
    }
}

pub struct AccountController {
    service: AccountService,
}

impl AccountController {
    pub fn new(service: AccountService) -> Self {
        AccountController { service }
    }

    pub async fn get_account(&self, request: &Request, account_id: &str) -> (String, String) {
        render(&request.path, self.service.get_account(account_id).await)
    }

    pub async fn get_balance(&self, request: &Request, account_id: &str) -> (String, String) {
        render(&request.path, self.service.get_balance(account_id).await)
    }

    pub async fn transaction_history(
        &self,
        request: &Request,
        account_id: &str,
    ) -> (String, String) {
        render(&request.path, self.service.transaction_history(account_id).await)
    }

    pub async fn create_account(&self, request: &Request) -> (String, String) {
        let new_account: NewAccount = match des_from_str(&request.body) {
            Ok(account) => account,
            Err(e) => return unreadable_body(&request.path, e),
        };
        match self.service.create_account(&new_account).await {
            Ok(account) => match ser_to_str(&account) {
                Ok(json) => (CREATED.to_string(), json),
                Err(e) => serde_failure(&request.path, e),
            },
            Err(err) => error_response(&request.path, err),
        }
    }

    pub async fn delete_account(&self, request: &Request, account_id: &str) -> (String, String) {
        match self.service.delete_account(account_id).await {
            Ok(()) => (NO_CONTENT.to_string(), "".to_string()),
            Err(err) => error_response(&request.path, err),
        }
    }

    pub async fn activate_account(&self, request: &Request, account_id: &str) -> (String, String) {
        render(&request.path, self.service.activate_account(account_id).await)
    }

    pub async fn deactivate_account(
        &self,
        request: &Request,
        account_id: &str,
    ) -> (String, String) {
        render(&request.path, self.service.deactivate_account(account_id).await)
    }

    pub async fn deposit(&self, request: &Request) -> (String, String) {
        let transaction = match validated_transaction(request) {
            Ok(transaction) => transaction,
            Err(response) => return response,
        };
        render(
            &request.path,
            self.service
                .deposit(&transaction.account_id, transaction.amount)
                .await,
        )
    }

    pub async fn withdraw(&self, request: &Request) -> (String, String) {
        let transaction = match validated_transaction(request) {
            Ok(transaction) => transaction,
            Err(response) => return response,
        };
        render(
            &request.path,
            self.service
                .withdraw(&transaction.account_id, transaction.amount)
                .await,
        )
    }

    pub async fn update_credit_limit(&self, request: &Request) -> (String, String) {
        let limit: TransactionRequest = match des_from_str(&request.body) {
            Ok(limit) => limit,
            Err(e) => return unreadable_body(&request.path, e),
        };
        render_optional(
            &request.path,
            self.service
                .update_credit_limit(&limit.account_id, limit.amount)
                .await,
        )
    }

    pub async fn update_fields(&self, request: &Request, account_id: &str) -> (String, String) {
        let updates: Vec<FieldUpdate> = match des_from_str(&request.body) {
            Ok(updates) => updates,
            Err(e) => return unreadable_body(&request.path, e),
        };
        let pairs: Vec<(String, String)> = updates.into_iter().map(FieldUpdate::into_pair).collect();
        render_optional(
            &request.path,
            self.service.update_fields(account_id, &pairs).await,
        )
    }
}

/// Deposit and withdraw take a well-formed account id and a strictly positive amount.
fn validated_transaction(request: &Request) -> Result<TransactionRequest, (String, String)> {
    let transaction: TransactionRequest =
        des_from_str(&request.body).map_err(|e| unreadable_body(&request.path, e))?;

    let invalid_field = if is_malformed_identifier(&transaction.account_id) {
        Some("accountId")
    } else if transaction.amount <= Decimal::ZERO {
        Some("amount")
    } else {
        None
    };
    if let Some(field) = invalid_field {
        warn!(path = %request.path, field, "request validation failed");
        return Err((
            BAD_REQUEST.to_string(),
            api_error(
                &request.path,
                format!("Request validation exception [field: {}]", field),
                400,
            ),
        ));
    }
    Ok(transaction)
}

fn render<T: Serialize>(path: &str, result: Result<T, AccountError>) -> (String, String) {
    match result {
        Ok(value) => match ser_to_str(&value) {
            Ok(json) => (OK_RESPONSE.to_string(), json),
            Err(e) => serde_failure(path, e),
        },
        Err(err) => error_response(path, err),
    }
}

fn render_optional<T: Serialize>(
    path: &str,
    result: Result<Option<T>, AccountError>,
) -> (String, String) {
    match result {
        Ok(None) => (NO_CONTENT.to_string(), "".to_string()),
        Ok(Some(value)) => render(path, Ok(value)),
        Err(err) => error_response(path, err),
    }
}

fn unreadable_body(path: &str, e: serde_json::Error) -> (String, String) {
    warn!(path, "invalid body: {}", e);
    (
        BAD_REQUEST.to_string(),
        api_error(path, "Wrong field type exception", 400),
    )
}

fn serde_failure(path: &str, e: serde_json::Error) -> (String, String) {
    error!(path, "serde error: {}", e);
    (
        INTERNAL_ERROR.to_string(),
        api_error(path, "Serialization failure", 500),
    )
}

pub fn error_response(path: &str, err: AccountError) -> (String, String) {
    let (status_line, status_code, message) = match &err {
        AccountError::InvalidIdentifierFormat(_)
        | AccountError::InsufficientFunds { .. }
        | AccountError::AmountOutOfRange { .. }
        | AccountError::UnauthorizedFieldUpdate(_)
        | AccountError::InvalidFieldValue { .. } => (BAD_REQUEST, 400, err.to_string()),
        AccountError::AccountNotFound(_) => (NOT_FOUND, 404, err.to_string()),
        AccountError::ConcurrentUpdate(_) => (CONFLICT, 409, err.to_string()),
        AccountError::InactiveAccount(_) => (INTERNAL_ERROR, 500, err.to_string()),
        AccountError::StorageIntegrity(_) => {
            (INTERNAL_ERROR, 500, "Internal SQL error".to_string())
        }
        AccountError::Database(_) => (INTERNAL_ERROR, 500, "Internal database error".to_string()),
    };
    if status_code >= 500 {
        error!(path, "request failed: {:?}", err);
    } else {
        warn!(path, "request rejected: {}", err);
    }
    (status_line.to_string(), api_error(path, message, status_code))
}
