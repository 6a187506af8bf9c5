//! Canonical account records produced by normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account type enumeration
///
/// Derived from the queried group name, never from the response data. Two
/// differently-typed queries against the same ledger would classify the same
/// entity differently; that follows the upstream grouping model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Entries under a debtors group (money owed to us)
    Debtor,
    /// Entries under a creditors group (money we owe)
    Creditor,
}

impl AccountType {
    /// Classify a queried group name
    pub fn from_group(group_name: &str) -> Self {
        if group_name.to_lowercase().contains("debtor") {
            AccountType::Debtor
        } else {
            AccountType::Creditor
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debtor" | "debtors" => Ok(AccountType::Debtor),
            "creditor" | "creditors" => Ok(AccountType::Creditor),
            _ => Err(format!("Invalid account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Debtor => write!(f, "debtor"),
            AccountType::Creditor => write!(f, "creditor"),
        }
    }
}

/// One ledger entry at a point in time, immutable once constructed.
///
/// The balance stores the resolved magnitude only; the debit/credit sign is
/// consumed during normalization and does not survive into the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Ledger name, synthesized placeholder when absent upstream
    pub name: String,
    /// Debtor or creditor, per the queried group
    pub account_type: AccountType,
    /// Non-negative balance magnitude
    pub balance: f64,
    /// Raw due date text, may be empty; no date parsing is attempted
    pub due_date: String,
    /// Parent group, defaulting to the queried group name
    pub parent_group: String,
    /// Extraction timestamp
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_from_group() {
        assert_eq!(AccountType::from_group("Sundry Debtors"), AccountType::Debtor);
        assert_eq!(AccountType::from_group("SUNDRY DEBTORS"), AccountType::Debtor);
        assert_eq!(AccountType::from_group("Sundry Creditors"), AccountType::Creditor);
        assert_eq!(AccountType::from_group("Loans"), AccountType::Creditor);
    }

    #[test]
    fn test_account_type_round_trip() {
        assert_eq!("debtor".parse::<AccountType>().unwrap(), AccountType::Debtor);
        assert_eq!("Creditor".parse::<AccountType>().unwrap(), AccountType::Creditor);
        assert_eq!(AccountType::Debtor.to_string(), "debtor");
        assert!("supplier".parse::<AccountType>().is_err());
    }
}
