//! Shorthands for common transaction kinds
//!
//! Each wrapper fills in the transaction type, the references and the configured
//! default currency, then goes through [`TransactionOrchestrator::create_transaction`].

use rust_decimal::Decimal;

use crate::core::orchestrator::TransactionOrchestrator;
use crate::types::{
    CreateTransactionRequest, PaymentMethod, Transaction, TransactionError, TransactionType,
};

impl TransactionOrchestrator {
    fn request(&self, user_id: &str, tx_type: TransactionType, amount: Decimal) -> CreateTransactionRequest {
        CreateTransactionRequest::new(user_id, tx_type, amount)
            .currency(self.config().default_currency.clone())
    }

    pub fn wallet_deposit(
        &self,
        user_id: &str,
        wallet_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::WalletDeposit, amount)
            .to_account(wallet_id)
            .description(description)
            .payment_method(PaymentMethod::Wallet);
        self.create_transaction(request, user_id)
    }

    pub fn wallet_withdrawal(
        &self,
        user_id: &str,
        wallet_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::WalletWithdrawal, amount)
            .from_account(wallet_id)
            .description(description)
            .payment_method(PaymentMethod::Wallet);
        self.create_transaction(request, user_id)
    }

    pub fn wallet_transfer(
        &self,
        user_id: &str,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::WalletTransfer, amount)
            .from_account(from_wallet_id)
            .to_account(to_wallet_id)
            .description(description)
            .payment_method(PaymentMethod::Wallet);
        self.create_transaction(request, user_id)
    }

    /// Charge a credit card on behalf of a merchant
    pub fn credit_card_charge(
        &self,
        user_id: &str,
        card_id: &str,
        amount: Decimal,
        merchant_name: &str,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::CreditCharge, amount)
            .from_card(card_id)
            .merchant(merchant_name)
            .description(description)
            .payment_method(PaymentMethod::CreditCard);
        self.create_transaction(request, user_id)
    }

    /// Repay a credit card from an account
    pub fn credit_card_payment(
        &self,
        user_id: &str,
        card_id: &str,
        from_account_id: &str,
        amount: Decimal,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::CreditPayment, amount)
            .from_account(from_account_id)
            .to_card(card_id)
            .description("Credit card payment")
            .payment_method(PaymentMethod::BankTransfer);
        self.create_transaction(request, user_id)
    }

    pub fn debit_card_purchase(
        &self,
        user_id: &str,
        card_id: &str,
        amount: Decimal,
        merchant_name: &str,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::DebitPurchase, amount)
            .from_card(card_id)
            .merchant(merchant_name)
            .description(description)
            .payment_method(PaymentMethod::DebitCard);
        self.create_transaction(request, user_id)
    }

    pub fn account_transfer(
        &self,
        user_id: &str,
        from_account_id: &str,
        to_account_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::AccountTransfer, amount)
            .from_account(from_account_id)
            .to_account(to_account_id)
            .description(description)
            .payment_method(PaymentMethod::BankTransfer);
        self.create_transaction(request, user_id)
    }

    pub fn account_deposit(
        &self,
        user_id: &str,
        account_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::AccountDeposit, amount)
            .to_account(account_id)
            .description(description)
            .payment_method(PaymentMethod::BankTransfer);
        self.create_transaction(request, user_id)
    }

    pub fn account_withdraw(
        &self,
        user_id: &str,
        account_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, TransactionError> {
        let request = self
            .request(user_id, TransactionType::AccountWithdraw, amount)
            .from_account(account_id)
            .description(description)
            .payment_method(PaymentMethod::BankTransfer);
        self.create_transaction(request, user_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::adapters::{InMemoryLedger, InMemoryUserDirectory};
    use crate::config::EngineConfig;
    use crate::core::orchestrator::{Collaborators, TransactionOrchestrator};
    use crate::types::{Account, AccountType, TransactionStatus, TransactionType};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn orchestrator(ledger: Arc<InMemoryLedger>, currency: &str) -> TransactionOrchestrator {
        let users = Arc::new(InMemoryUserDirectory::with_users(["u1"]));
        TransactionOrchestrator::new(
            EngineConfig::default().with_currency(currency),
            Collaborators::in_memory(ledger, users),
        )
    }

    #[test]
    fn test_wrappers_apply_default_currency() {
        let ledger = Arc::new(InMemoryLedger::with_accounts([Account::new(
            "w1",
            "u1",
            AccountType::Wallet,
            Decimal::ZERO,
        )]));
        let orchestrator = orchestrator(ledger.clone(), "EUR");

        let tx = orchestrator
            .wallet_deposit("u1", "w1", Decimal::new(25, 0), "top up")
            .unwrap();

        assert_eq!(tx.currency, "EUR");
        assert_eq!(tx.tx_type, TransactionType::WalletDeposit);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(ledger.account("w1").unwrap().balance, Decimal::new(25, 0));
    }

    #[test]
    fn test_credit_card_charge_then_payment() {
        let ledger = Arc::new(InMemoryLedger::with_accounts([
            Account::credit("c1", "u1", Decimal::new(500, 0)),
            Account::new("chk", "u1", AccountType::Checking, Decimal::new(300, 0)),
        ]));
        let orchestrator = orchestrator(ledger.clone(), "USD");

        let charge = orchestrator
            .credit_card_charge("u1", "c1", Decimal::new(120, 0), "Grocer", "food")
            .unwrap();
        assert_eq!(charge.merchant_name.as_deref(), Some("Grocer"));

        orchestrator
            .credit_card_payment("u1", "c1", "chk", Decimal::new(20, 0))
            .unwrap();

        let card = ledger.account("c1").unwrap();
        assert_eq!(card.used_credit, Decimal::new(100, 0));
    }
}
