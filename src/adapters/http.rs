//! HTTP collaborators
//!
//! Blocking JSON clients for the account service, the user service and the
//! notification service. Every call maps the HTTP outcome onto a [`ServiceError`]:
//!
//! - `404` becomes `NotFound`
//! - `402`, or a refusal whose message mentions insufficient funds, becomes
//!   `InsufficientFunds`
//! - any other `4xx` becomes `Rejected`
//! - `5xx`, transport failures and undecodable bodies become `Unavailable`

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::traits::{AccountLedger, NotificationDispatcher, UserDirectory};
use crate::types::{AccountInfo, AccountType, ServiceError, Transaction, UserLimits};

/// Client timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct BalanceUpdateRequest<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    description: &'a str,
    reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct BalanceUpdateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    balance: Option<Decimal>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResponse {
    id: String,
    user_id: String,
    account_type: String,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct UserLimitsResponse {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    daily_limit: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    monthly_limit: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    single_transaction_limit: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    approval_threshold: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct NotificationRequest<'a> {
    transaction_id: String,
    user_id: &'a str,
    #[serde(rename = "type")]
    tx_type: &'a str,
    status: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
}

fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::unavailable(format!("failed to build HTTP client: {}", e)))
}

fn transport_error(error: reqwest::Error) -> ServiceError {
    ServiceError::unavailable(format!("error calling service: {}", error))
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    response
        .json::<T>()
        .map_err(|e| ServiceError::unavailable(format!("error decoding response: {}", e)))
}

/// Map a non-success status onto a `ServiceError`
fn status_error(id: &str, status: StatusCode, message: Option<String>) -> ServiceError {
    let message = message.unwrap_or_else(|| format!("service returned status {}", status));
    if status == StatusCode::NOT_FOUND {
        ServiceError::not_found(id)
    } else if status.is_client_error() {
        ServiceError::rejected(id, message)
    } else {
        ServiceError::unavailable(message)
    }
}

fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// [`AccountLedger`] backed by the account service REST API
#[derive(Debug, Clone)]
pub struct HttpAccountLedger {
    client: Client,
    base_url: String,
}

impl HttpAccountLedger {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(HttpAccountLedger {
            client: build_client(timeout)?,
            base_url: trim_base(base_url),
        })
    }

    fn url(&self, account_id: &str, suffix: &str) -> String {
        format!("{}/api/accounts/{}{}", self.base_url, account_id, suffix)
    }

    fn get_json<T: DeserializeOwned>(&self, account_id: &str, suffix: &str) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(account_id, suffix))
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(account_id, status, None));
        }
        decode(response)
    }

    /// POST a balance update and return the balance reported by the service
    fn post_update(
        &self,
        account_id: &str,
        suffix: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        let request = BalanceUpdateRequest {
            amount,
            description,
            reference,
        };
        let response = self
            .client
            .post(self.url(account_id, suffix))
            .json(&request)
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        let body: Option<BalanceUpdateResponse> = response.json().ok();

        if status.is_success() {
            return match body {
                Some(BalanceUpdateResponse {
                    success: true,
                    balance: Some(balance),
                    ..
                }) => Ok(balance),
                Some(BalanceUpdateResponse { message, .. }) => Err(ServiceError::rejected(
                    account_id,
                    message.unwrap_or_else(|| "update not applied".to_string()),
                )),
                None => Err(ServiceError::unavailable("error decoding response")),
            };
        }

        let (balance, message) = body
            .map(|b| (b.balance, b.message))
            .unwrap_or((None, None));
        let insufficient = status == StatusCode::PAYMENT_REQUIRED
            || message
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains("insufficient"));
        if status.is_client_error() && insufficient {
            return Err(ServiceError::InsufficientFunds {
                id: account_id.to_string(),
                available: balance.unwrap_or(Decimal::ZERO),
                requested: amount,
            });
        }
        Err(status_error(account_id, status, message))
    }
}

impl AccountLedger for HttpAccountLedger {
    fn get_balance(&self, account_id: &str) -> Result<Decimal, ServiceError> {
        self.get_json::<BalanceResponse>(account_id, "/balance")
            .map(|r| r.balance)
    }

    fn add_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.post_update(account_id, "/add-funds", amount, description, reference)
    }

    fn withdraw_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.post_update(account_id, "/withdraw-funds", amount, description, reference)
    }

    fn update_credit_usage(
        &self,
        account_id: &str,
        delta: Decimal,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.post_update(account_id, "/update-credit", delta, "credit usage", reference)
    }

    fn get_account_info(&self, account_id: &str) -> Result<AccountInfo, ServiceError> {
        let info: AccountInfoResponse = self.get_json(account_id, "")?;
        let account_type = info
            .account_type
            .parse::<AccountType>()
            .map_err(ServiceError::unavailable)?;
        Ok(AccountInfo {
            id: info.id,
            owner: info.user_id,
            account_type,
            is_active: info.is_active,
        })
    }

    fn get_available_credit(&self, account_id: &str) -> Result<Decimal, ServiceError> {
        self.get_json::<BalanceResponse>(account_id, "/available-credit")
            .map(|r| r.balance)
    }

    fn validate_account_exists(&self, account_id: &str) -> Result<bool, ServiceError> {
        match self.get_account_info(account_id) {
            Ok(info) => Ok(info.is_active),
            Err(ServiceError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// [`UserDirectory`] backed by the user service REST API
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Ok(HttpUserDirectory {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base(base_url),
        })
    }

    fn get(&self, user_id: &str, suffix: &str) -> Result<Response, ServiceError> {
        let url = format!("{}/api/users/{}{}", self.base_url, user_id, suffix);
        let response = self.client.get(url).send().map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(user_id, status, None));
        }
        Ok(response)
    }
}

impl UserDirectory for HttpUserDirectory {
    fn validate_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.get(user_id, "").map(|_| ())
    }

    fn get_user_limits(&self, user_id: &str) -> Result<Option<UserLimits>, ServiceError> {
        match self.get(user_id, "/limits") {
            Ok(response) => {
                let limits: UserLimitsResponse = decode(response)?;
                Ok(Some(UserLimits {
                    daily_limit: limits.daily_limit,
                    monthly_limit: limits.monthly_limit,
                    single_transaction_limit: limits.single_transaction_limit,
                    approval_threshold: limits.approval_threshold,
                }))
            }
            Err(ServiceError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// [`NotificationDispatcher`] posting to the notification service
#[derive(Debug, Clone)]
pub struct HttpNotificationDispatcher {
    client: Client,
    base_url: String,
}

impl HttpNotificationDispatcher {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Ok(HttpNotificationDispatcher {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base(base_url),
        })
    }
}

impl NotificationDispatcher for HttpNotificationDispatcher {
    fn send_transaction_notification(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        let request = NotificationRequest {
            transaction_id: transaction.id.to_string(),
            user_id: &transaction.user_id,
            tx_type: transaction.tx_type.as_str(),
            status: transaction.status.as_str(),
            amount: transaction.amount,
            currency: &transaction.currency,
        };
        let response = self
            .client
            .post(format!("{}/api/notifications/transactions", self.base_url))
            .json(&request)
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(&transaction.user_id, status, None));
        }
        Ok(())
    }
}
