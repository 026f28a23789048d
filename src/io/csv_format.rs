//! CSV format handling for replay input and output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `AccountRecord` and `RequestRecord` structures for deserialization
//! - Conversion from CSV records to domain types
//! - Result row and balance serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{
    Account, AccountType, CreateTransactionRequest, PaymentMethod, ReplayAction, ReplayCommand,
    ReplayOutcome, RequestNo, TransactionType,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// One row of the accounts file
///
/// Columns: id, owner, type, balance, credit_limit, used_credit, active. Everything
/// after `type` is optional.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRecord {
    pub id: String,
    pub owner: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: Option<String>,
    pub credit_limit: Option<String>,
    pub used_credit: Option<String>,
    pub active: Option<String>,
}

/// One row of the requests file
///
/// `op` defaults to `create`. Lifecycle operations (`process`, `complete`, `fail`,
/// `cancel`, `reverse`) name the request number of an earlier create in `target`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct RequestRecord {
    pub request: RequestNo,
    pub op: Option<String>,
    pub user: String,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub from_card: Option<String>,
    pub to_card: Option<String>,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub payment_method: Option<String>,
    pub record_only: Option<String>,
    pub target: Option<RequestNo>,
    pub reason: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_amount(value: Option<String>, field: &str) -> Result<Option<Decimal>, String> {
    match present(value) {
        Some(raw) => Decimal::from_str(&raw)
            .map(Some)
            .map_err(|_| format!("Invalid {} '{}'", field, raw)),
        None => Ok(None),
    }
}

fn parse_flag(value: Option<String>, field: &str) -> Result<Option<bool>, String> {
    match present(value).map(|v| v.to_lowercase()) {
        None => Ok(None),
        Some(v) if v == "true" || v == "1" || v == "yes" => Ok(Some(true)),
        Some(v) if v == "false" || v == "0" || v == "no" => Ok(Some(false)),
        Some(v) => Err(format!("Invalid {} '{}'", field, v)),
    }
}

/// Convert an AccountRecord to an Account
///
/// Missing amounts default to zero and `active` defaults to true.
///
/// # Returns
///
/// Result containing either:
/// - Ok(Account) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_account_record(record: AccountRecord) -> Result<Account, String> {
    let id = present(Some(record.id)).ok_or("Account id is required")?;
    let owner = present(Some(record.owner))
        .ok_or_else(|| format!("Owner is required for account {}", id))?;
    let account_type = AccountType::from_str(&record.account_type)?;

    let balance = parse_amount(record.balance, "balance")?.unwrap_or(Decimal::ZERO);
    let credit_limit = parse_amount(record.credit_limit, "credit_limit")?.unwrap_or(Decimal::ZERO);
    let used_credit = parse_amount(record.used_credit, "used_credit")?.unwrap_or(Decimal::ZERO);
    let is_active = parse_flag(record.active, "active")?.unwrap_or(true);

    if balance < Decimal::ZERO {
        return Err(format!("Negative balance for account {}", id));
    }
    if used_credit < Decimal::ZERO || used_credit > credit_limit {
        return Err(format!(
            "Used credit {} outside credit limit {} for account {}",
            used_credit, credit_limit, id
        ));
    }

    Ok(Account {
        id,
        owner,
        account_type,
        balance,
        credit_limit,
        used_credit,
        is_active,
    })
}

/// Convert a RequestRecord to a ReplayCommand
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
/// * `default_currency` - Currency used when the row leaves it empty
///
/// # Returns
///
/// * `Ok(ReplayCommand)` - Successfully converted record
/// * `Err(String)` - Error message naming the request number
pub fn convert_request_record(
    record: RequestRecord,
    default_currency: &str,
) -> Result<ReplayCommand, String> {
    let request = record.request;
    let user = present(Some(record.user))
        .ok_or_else(|| format!("User is required for request {}", request))?;
    let op = present(record.op).map(|op| op.to_lowercase());

    let target = || {
        record
            .target
            .ok_or_else(|| format!("Request {} requires a target", request))
    };
    let reason = || present(record.reason.clone()).unwrap_or_default();

    let action = match op.as_deref().unwrap_or("create") {
        "create" => {
            let tx_type = present(record.tx_type)
                .ok_or_else(|| format!("Transaction type is required for request {}", request))?;
            let tx_type = TransactionType::from_str(&tx_type)
                .map_err(|e| format!("{} for request {}", e, request))?;
            let amount = parse_amount(record.amount, "amount")
                .map_err(|e| format!("{} for request {}", e, request))?
                .ok_or_else(|| format!("Request {} requires an amount", request))?;

            let mut create = CreateTransactionRequest::new(user.clone(), tx_type, amount)
                .currency(present(record.currency).unwrap_or_else(|| default_currency.to_string()));
            create.from_account_id = present(record.from_account);
            create.to_account_id = present(record.to_account);
            create.from_card_id = present(record.from_card);
            create.to_card_id = present(record.to_card);
            create.merchant_name = present(record.merchant);
            if let Some(description) = present(record.description) {
                create = create.description(description);
            }
            if let Some(method) = present(record.payment_method) {
                create = create.payment_method(
                    PaymentMethod::from_str(&method)
                        .map_err(|e| format!("{} for request {}", e, request))?,
                );
            }
            if parse_flag(record.record_only, "record_only")?.unwrap_or(false) {
                create = create.record_only();
            }
            ReplayAction::Create(create)
        }
        "process" => ReplayAction::Process { target: target()? },
        "complete" => ReplayAction::Complete { target: target()? },
        "fail" => ReplayAction::Fail {
            target: target()?,
            reason: reason(),
        },
        "cancel" => ReplayAction::Cancel {
            target: target()?,
            reason: reason(),
        },
        "reverse" => ReplayAction::Reverse {
            target: target()?,
            reason: reason(),
        },
        other => {
            return Err(format!(
                "Invalid operation: '{}' for request {}",
                other, request
            ))
        }
    };

    Ok(ReplayCommand {
        request,
        user,
        action,
    })
}

/// Write one result row per replayed request
///
/// Columns: request, status, error, message, transaction_id. Rows are sorted by
/// request number so both strategies produce identical files.
pub fn write_results_csv(outcomes: &[ReplayOutcome], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["request", "status", "error", "message", "transaction_id"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&ReplayOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|outcome| outcome.request);

    for outcome in sorted {
        writer
            .write_record(&[
                outcome.request.to_string(),
                outcome.status.map(|s| s.to_string()).unwrap_or_default(),
                outcome.error_kind.unwrap_or_default().to_string(),
                outcome.message.clone(),
                outcome
                    .transaction_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            ])
            .map_err(|e| format!("Failed to write result record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write final ledger state
///
/// Columns: id, owner, type, balance, used_credit, available_credit, active.
/// Accounts are sorted by id for deterministic output.
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "id",
            "owner",
            "type",
            "balance",
            "used_credit",
            "available_credit",
            "active",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    for account in sorted {
        writer
            .write_record(&[
                account.id.clone(),
                account.owner.clone(),
                account.account_type.to_string(),
                format!("{:.4}", account.balance),
                format!("{:.4}", account.used_credit),
                format!("{:.4}", account.available_credit()),
                account.is_active.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TransactionError, TransactionStatus};
    use rstest::rstest;

    fn account_record(account_type: &str, balance: Option<&str>) -> AccountRecord {
        AccountRecord {
            id: "a1".to_string(),
            owner: "u1".to_string(),
            account_type: account_type.to_string(),
            balance: balance.map(str::to_string),
            credit_limit: None,
            used_credit: None,
            active: None,
        }
    }

    fn create_record(tx_type: &str, amount: Option<&str>) -> RequestRecord {
        RequestRecord {
            request: 7,
            user: "u1".to_string(),
            tx_type: Some(tx_type.to_string()),
            amount: amount.map(str::to_string),
            from_account: Some("a1".to_string()),
            ..RequestRecord::default()
        }
    }

    #[rstest]
    #[case::wallet("wallet", Some("100.50"), AccountType::Wallet, Decimal::new(10050, 2))]
    #[case::credit_alias("credit_card", None, AccountType::Credit, Decimal::ZERO)]
    #[case::case_insensitive("CHECKING", Some("  1  "), AccountType::Checking, Decimal::ONE)]
    fn test_convert_account_record_valid(
        #[case] account_type: &str,
        #[case] balance: Option<&str>,
        #[case] expected_type: AccountType,
        #[case] expected_balance: Decimal,
    ) {
        let account = convert_account_record(account_record(account_type, balance)).unwrap();

        assert_eq!(account.account_type, expected_type);
        assert_eq!(account.balance, expected_balance);
        assert!(account.is_active);
    }

    #[rstest]
    #[case::invalid_type("bond", Some("1"), "Invalid account type")]
    #[case::invalid_balance("wallet", Some("lots"), "Invalid balance")]
    #[case::negative_balance("wallet", Some("-1"), "Negative balance")]
    fn test_convert_account_record_errors(
        #[case] account_type: &str,
        #[case] balance: Option<&str>,
        #[case] expected_error: &str,
    ) {
        let result = convert_account_record(account_record(account_type, balance));
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[test]
    fn test_convert_account_record_rejects_overdrawn_credit() {
        let mut record = account_record("credit", None);
        record.credit_limit = Some("100".to_string());
        record.used_credit = Some("150".to_string());

        let result = convert_account_record(record);
        assert!(result.unwrap_err().contains("outside credit limit"));
    }

    #[test]
    fn test_convert_request_record_create_applies_default_currency() {
        let command = convert_request_record(create_record("wallet_withdrawal", Some("12.5")), "EUR")
            .unwrap();

        assert_eq!(command.request, 7);
        assert_eq!(command.user, "u1");
        match command.action {
            ReplayAction::Create(request) => {
                assert_eq!(request.tx_type, TransactionType::WalletWithdrawal);
                assert_eq!(request.amount, Decimal::new(125, 1));
                assert_eq!(request.currency, "EUR");
                assert_eq!(request.from_account_id.as_deref(), Some("a1"));
                assert_eq!(request.to_account_id, None);
                assert!(!request.record_only);
            }
            other => panic!("Expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_request_record_record_only_flag() {
        let mut record = create_record("installment_plan_completion", Some("1"));
        record.record_only = Some("true".to_string());

        let command = convert_request_record(record, "USD").unwrap();
        assert!(matches!(command.action, ReplayAction::Create(request) if request.record_only));
    }

    #[rstest]
    #[case::invalid_type(create_record("teleport", Some("1")), "Invalid transaction type")]
    #[case::missing_amount(create_record("wallet_deposit", None), "requires an amount")]
    #[case::blank_amount(create_record("wallet_deposit", Some("  ")), "requires an amount")]
    #[case::invalid_amount(create_record("wallet_deposit", Some("ten")), "Invalid amount")]
    #[case::unknown_op(RequestRecord { op: Some("dispute".to_string()), ..create_record("wallet_deposit", Some("1")) }, "Invalid operation")]
    #[case::missing_target(RequestRecord { op: Some("reverse".to_string()), ..create_record("wallet_deposit", Some("1")) }, "requires a target")]
    fn test_convert_request_record_errors(
        #[case] record: RequestRecord,
        #[case] expected_error: &str,
    ) {
        let result = convert_request_record(record, "USD");
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[rstest]
    #[case::process("process", ReplayAction::Process { target: 3 })]
    #[case::complete("complete", ReplayAction::Complete { target: 3 })]
    #[case::cancel("cancel", ReplayAction::Cancel { target: 3, reason: "because".to_string() })]
    #[case::reverse("REVERSE", ReplayAction::Reverse { target: 3, reason: "because".to_string() })]
    fn test_convert_request_record_lifecycle(#[case] op: &str, #[case] expected: ReplayAction) {
        let record = RequestRecord {
            request: 9,
            op: Some(op.to_string()),
            user: "u1".to_string(),
            target: Some(3),
            reason: Some("because".to_string()),
            ..RequestRecord::default()
        };

        let command = convert_request_record(record, "USD").unwrap();
        assert_eq!(command.action, expected);
    }

    #[test]
    fn test_write_results_csv_sorted_by_request() {
        let outcomes = vec![
            ReplayOutcome::failed(2, &TransactionError::validation("amount must be positive"), None),
            ReplayOutcome::rejected(1, "parse", "bad row"),
        ];

        let mut output = Vec::new();
        write_results_csv(&outcomes, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "request,status,error,message,transaction_id\n\
             1,,parse,bad row,\n\
             2,,validation_error,Validation failed: amount must be positive,\n"
        );
    }

    #[test]
    fn test_write_results_csv_includes_status() {
        let outcome = ReplayOutcome {
            request: 1,
            transaction_id: None,
            status: Some(TransactionStatus::Completed),
            error_kind: None,
            message: String::new(),
        };

        let mut output = Vec::new();
        write_results_csv(&[outcome], &mut output).unwrap();

        assert!(String::from_utf8(output)
            .unwrap()
            .ends_with("1,completed,,,\n"));
    }

    #[rstest]
    #[case::empty(vec![], "id,owner,type,balance,used_credit,available_credit,active\n")]
    #[case::sorted_by_id(
        vec![
            Account::new("b", "u2", AccountType::Wallet, Decimal::new(5, 1)),
            Account::credit("a", "u1", Decimal::new(100, 0)),
        ],
        "id,owner,type,balance,used_credit,available_credit,active\n\
         a,u1,credit,0.0000,0.0000,100.0000,true\n\
         b,u2,wallet,0.5000,0.0000,0.0000,true\n"
    )]
    fn test_write_balances_csv(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        write_balances_csv(&accounts, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }
}
