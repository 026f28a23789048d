//! HTTP collaborators against a mock service

use std::sync::Arc;

use mockito::{Matcher, Server};
use rstest::rstest;
use rust_decimal::Decimal;
use serde_json::json;
use transaction_engine::adapters::{
    HttpAccountLedger, HttpNotificationDispatcher, HttpUserDirectory, InMemoryUserDirectory,
};
use transaction_engine::core::{AccountLedger, NotificationDispatcher, UserDirectory};
use transaction_engine::types::{AccountType, ServiceError};
use transaction_engine::{
    Collaborators, CreateTransactionRequest, EngineConfig, Transaction, TransactionOrchestrator,
    TransactionStatus, TransactionType,
};

#[test]
fn test_get_balance() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/api/accounts/acc-1/balance")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"balance": 125.5}"#)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();

    assert_eq!(ledger.get_balance("acc-1").unwrap(), Decimal::new(1255, 1));
    mock.assert();
}

#[test]
fn test_add_funds_posts_the_update() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/accounts/acc-1/add-funds")
        .match_body(Matcher::PartialJson(json!({
            "description": "Wallet Deposit",
            "reference": "tx-1",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "balance": 150.0}"#)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();
    let balance = ledger
        .add_funds("acc-1", Decimal::new(50, 0), "Wallet Deposit", "tx-1")
        .unwrap();

    assert_eq!(balance, Decimal::new(150, 0));
    mock.assert();
}

#[test]
fn test_unsuccessful_update_is_rejected() {
    let mut server = Server::new();
    server
        .mock("POST", "/api/accounts/acc-1/withdraw-funds")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": false, "message": "account frozen"}"#)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();
    let result = ledger.withdraw_funds("acc-1", Decimal::TEN, "withdrawal", "tx-2");

    assert!(matches!(
        result,
        Err(ServiceError::Rejected { ref message, .. }) if message == "account frozen"
    ));
}

#[rstest]
#[case::not_found(404, "{}", "not_found")]
#[case::payment_required(402, r#"{"balance": 5.0}"#, "insufficient_funds")]
#[case::insufficient_message(400, r#"{"message": "Insufficient funds"}"#, "insufficient_funds")]
#[case::other_client_error(422, r#"{"message": "bad amount"}"#, "rejected")]
#[case::server_error(503, "", "unavailable")]
fn test_withdraw_status_mapping(
    #[case] status: usize,
    #[case] body: &str,
    #[case] expected: &str,
) {
    let mut server = Server::new();
    server
        .mock("POST", "/api/accounts/acc-1/withdraw-funds")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();
    let error = ledger
        .withdraw_funds("acc-1", Decimal::TEN, "withdrawal", "tx-3")
        .unwrap_err();

    let kind = match error {
        ServiceError::NotFound { .. } => "not_found",
        ServiceError::InsufficientFunds { .. } => "insufficient_funds",
        ServiceError::Rejected { .. } => "rejected",
        ServiceError::Unavailable { .. } => "unavailable",
    };
    assert_eq!(kind, expected);
}

#[test]
fn test_insufficient_funds_reports_the_balance() {
    let mut server = Server::new();
    server
        .mock("POST", "/api/accounts/acc-1/withdraw-funds")
        .with_status(402)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": false, "balance": 5.0}"#)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();
    let result = ledger.withdraw_funds("acc-1", Decimal::TEN, "withdrawal", "tx-4");

    assert!(matches!(
        result,
        Err(ServiceError::InsufficientFunds { available, requested, .. })
            if available == Decimal::new(5, 0) && requested == Decimal::TEN
    ));
}

#[test]
fn test_account_info_and_existence() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/accounts/card-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "card-1", "user_id": "alice", "account_type": "credit", "is_active": true}"#)
        .create();
    server
        .mock("GET", "/api/accounts/gone")
        .with_status(404)
        .create();

    let ledger = HttpAccountLedger::new(&server.url()).unwrap();
    let info = ledger.get_account_info("card-1").unwrap();

    assert_eq!(info.owner, "alice");
    assert_eq!(info.account_type, AccountType::Credit);
    assert!(ledger.validate_account_exists("card-1").unwrap());
    assert!(!ledger.validate_account_exists("gone").unwrap());
}

#[test]
fn test_unreachable_service_is_unavailable() {
    let ledger = HttpAccountLedger::new("http://127.0.0.1:1").unwrap();

    assert!(matches!(
        ledger.get_balance("acc-1"),
        Err(ServiceError::Unavailable { .. })
    ));
}

#[test]
fn test_user_directory() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/users/alice")
        .with_status(200)
        .with_body("{}")
        .create();
    server
        .mock("GET", "/api/users/alice/limits")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"daily_limit": 500.0, "single_transaction_limit": 100.0}"#)
        .create();
    server
        .mock("GET", "/api/users/bob")
        .with_status(200)
        .with_body("{}")
        .create();
    server
        .mock("GET", "/api/users/bob/limits")
        .with_status(404)
        .create();
    server
        .mock("GET", "/api/users/ghost")
        .with_status(404)
        .create();

    let users = HttpUserDirectory::new(&server.url()).unwrap();

    assert!(users.validate_user("alice").is_ok());
    assert!(matches!(
        users.validate_user("ghost"),
        Err(ServiceError::NotFound { .. })
    ));

    let limits = users.get_user_limits("alice").unwrap().unwrap();
    assert_eq!(limits.daily_limit, Some(Decimal::new(500, 0)));
    assert_eq!(limits.single_transaction_limit, Some(Decimal::new(100, 0)));
    assert_eq!(limits.monthly_limit, None);
    assert_eq!(users.get_user_limits("bob").unwrap(), None);
}

#[test]
fn test_notification_dispatch() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/notifications/transactions")
        .match_body(Matcher::PartialJson(json!({
            "user_id": "alice",
            "type": "wallet_deposit",
            "status": "pending",
            "currency": "USD",
        })))
        .with_status(202)
        .create();

    let notifier = HttpNotificationDispatcher::new(&server.url()).unwrap();
    let transaction = Transaction::pending(
        CreateTransactionRequest::new("alice", TransactionType::WalletDeposit, Decimal::TEN)
            .currency("USD")
            .to_account("w1"),
        "alice",
        chrono::Utc::now(),
    );

    notifier.send_transaction_notification(&transaction).unwrap();
    mock.assert();
}

#[test]
fn test_orchestrator_over_http_ledger() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/accounts/w1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "w1", "user_id": "alice", "account_type": "wallet", "is_active": true}"#)
        .create();
    let deposit = server
        .mock("POST", "/api/accounts/w1/add-funds")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "balance": 60.0}"#)
        .expect(1)
        .create();

    let ledger = Arc::new(HttpAccountLedger::new(&server.url()).unwrap());
    let users = Arc::new(InMemoryUserDirectory::with_users(["alice"]));
    let orchestrator =
        TransactionOrchestrator::new(EngineConfig::default(), Collaborators::in_memory(ledger, users));

    let tx = orchestrator
        .create_transaction(
            CreateTransactionRequest::new("alice", TransactionType::WalletDeposit, Decimal::TEN)
                .currency("USD")
                .to_account("w1"),
            "alice",
        )
        .unwrap();

    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.previous_balance, Some(Decimal::new(50, 0)));
    assert_eq!(tx.new_balance, Some(Decimal::new(60, 0)));
    deposit.assert();
}
