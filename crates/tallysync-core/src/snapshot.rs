//! Dashboard snapshot aggregation
//!
//! Computed on demand from whatever the store currently holds; an empty
//! table is a valid zero-valued snapshot, not an error.

use serde::{Deserialize, Serialize};

use tallysync_parser::AccountType;

use crate::error::CoreError;
use crate::store::{Store, StoredAccount};

/// Aggregate figures over the stored account set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub total_debtors: f64,
    pub total_creditors: f64,
    /// Debtor total minus creditor total
    pub net_position: f64,
    pub total_accounts: usize,
    pub debtors_count: usize,
    pub creditors_count: usize,
    /// Most recent extraction timestamp across all rows, if any
    pub last_updated: Option<String>,
}

/// Full dashboard payload: summary plus the partitioned account lists,
/// each ordered by balance descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub summary: SnapshotSummary,
    pub debtors: Vec<StoredAccount>,
    pub creditors: Vec<StoredAccount>,
}

impl DashboardSnapshot {
    pub fn from_accounts(accounts: Vec<StoredAccount>) -> Self {
        let last_updated = accounts.iter().map(|a| a.last_updated.clone()).max();

        let (debtors, creditors): (Vec<_>, Vec<_>) = accounts
            .into_iter()
            .partition(|a| a.account_type == AccountType::Debtor);

        let total_debtors: f64 = debtors.iter().map(|a| a.closing_balance).sum();
        let total_creditors: f64 = creditors.iter().map(|a| a.closing_balance).sum();

        Self {
            summary: SnapshotSummary {
                total_debtors,
                total_creditors,
                net_position: total_debtors - total_creditors,
                total_accounts: debtors.len() + creditors.len(),
                debtors_count: debtors.len(),
                creditors_count: creditors.len(),
                last_updated,
            },
            debtors,
            creditors,
        }
    }
}

impl Store {
    /// Read all rows and compute the dashboard snapshot
    pub fn snapshot(&self) -> Result<DashboardSnapshot, CoreError> {
        Ok(DashboardSnapshot::from_accounts(self.fetch_all()?))
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(name: &str, account_type: AccountType, balance: f64, updated: &str) -> StoredAccount {
        StoredAccount {
            name: name.to_string(),
            account_type,
            closing_balance: balance,
            due_date: String::new(),
            parent_group: String::new(),
            last_updated: updated.to_string(),
        }
    }

    #[test]
    fn test_summary_aggregates() {
        let snapshot = DashboardSnapshot::from_accounts(vec![
            stored("A", AccountType::Debtor, 100.0, "2024-01-02T00:00:00+00:00"),
            stored("B", AccountType::Debtor, 50.0, "2024-01-03T00:00:00+00:00"),
            stored("C", AccountType::Creditor, 40.0, "2024-01-01T00:00:00+00:00"),
        ]);

        assert_eq!(snapshot.summary.total_debtors, 150.0);
        assert_eq!(snapshot.summary.total_creditors, 40.0);
        assert_eq!(snapshot.summary.net_position, 110.0);
        assert_eq!(snapshot.summary.total_accounts, 3);
        assert_eq!(snapshot.summary.debtors_count, 2);
        assert_eq!(snapshot.summary.creditors_count, 1);
        assert_eq!(
            snapshot.summary.last_updated.as_deref(),
            Some("2024-01-03T00:00:00+00:00")
        );
        assert_eq!(snapshot.debtors.len(), 2);
        assert_eq!(snapshot.creditors.len(), 1);
    }

    #[test]
    fn test_empty_table_is_zero_valued() {
        let snapshot = DashboardSnapshot::from_accounts(Vec::new());
        assert_eq!(snapshot.summary.total_accounts, 0);
        assert_eq!(snapshot.summary.net_position, 0.0);
        assert!(snapshot.summary.last_updated.is_none());
        assert!(snapshot.debtors.is_empty());
        assert!(snapshot.creditors.is_empty());
    }

    #[test]
    fn test_partition_preserves_balance_ordering() {
        let snapshot = DashboardSnapshot::from_accounts(vec![
            stored("Big", AccountType::Debtor, 1000.0, "t"),
            stored("Mid", AccountType::Creditor, 500.0, "t"),
            stored("Small", AccountType::Debtor, 10.0, "t"),
        ]);
        let debtor_names: Vec<&str> = snapshot.debtors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(debtor_names, vec!["Big", "Small"]);
    }
}
