//! In-memory rule storage

use dashmap::DashMap;

use crate::core::traits::RuleRepository;
use crate::types::{RuleId, TransactionError, TransactionRule};

/// In-memory [`RuleRepository`]
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: DashMap<RuleId, TransactionRule>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleRepository for InMemoryRuleStore {
    fn create(&self, rule: &TransactionRule) -> Result<(), TransactionError> {
        if self.rules.contains_key(&rule.id) {
            return Err(TransactionError::storage(format!(
                "rule {} already exists",
                rule.id
            )));
        }
        self.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    fn get(&self, id: RuleId) -> Result<Option<TransactionRule>, TransactionError> {
        Ok(self.rules.get(&id).map(|entry| entry.value().clone()))
    }

    fn update(&self, rule: &TransactionRule) -> Result<(), TransactionError> {
        match self.rules.get_mut(&rule.id) {
            Some(mut entry) => {
                *entry = rule.clone();
                Ok(())
            }
            None => Err(TransactionError::storage(format!(
                "rule {} not found",
                rule.id
            ))),
        }
    }

    fn delete(&self, id: RuleId) -> Result<bool, TransactionError> {
        Ok(self.rules.remove(&id).is_some())
    }

    fn rules_for_user(&self, user_id: &str) -> Result<Vec<TransactionRule>, TransactionError> {
        let mut rules: Vec<TransactionRule> = self
            .rules
            .iter()
            .filter(|entry| entry.scope.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        rules.sort_by_key(|rule| (rule.created_at, rule.id));
        Ok(rules)
    }
}
