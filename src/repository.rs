//! Pluggable persistence for accounts and their transaction histories.
//!
//! The ledger only talks to a [`Repository`]. Two backends are provided:
//! [`InMemoryRepository`] and, with the `storage-file` feature,
//! [`FileRepository`].

#[cfg(feature = "storage-file")]
mod file;
mod memory;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[cfg(feature = "storage-file")]
pub use file::FileRepository;
pub use memory::InMemoryRepository;

use crate::error::{LedgerError, Result};
use crate::models::{Account, AccountId, AccountKey, Amount, Transaction, TransactionId};

/// Storage backend for accounts and transaction histories.
///
/// All methods take `&self`; implementations use interior mutability
/// (e.g. `Mutex`) for thread-safe mutation. Serializing merges per account
/// is the caller's job; a backend only has to keep each call atomic.
pub trait Repository: core::fmt::Debug + Send + Sync {
    /// Returns all stored accounts in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn accounts(&self) -> Result<Vec<Account>>;

    /// Looks up an account by its internal identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn account(&self, id: &AccountId) -> Result<Option<Account>>;

    /// Looks up an account by its canonical institution key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn account_by_key(&self, key: &AccountKey) -> Result<Option<Account>>;

    /// Inserts or updates accounts (matched by ID).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    fn upsert_accounts(&self, accounts: Vec<Account>) -> Result<()>;

    /// Returns the transaction history of an account in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn transactions(&self, account: &AccountId) -> Result<Vec<Transaction>>;

    /// Appends the inserted transactions of a merge and stores the account's
    /// new cached balance, in one write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account is unknown,
    /// [`LedgerError::DuplicateTransaction`] if an inserted ID is already
    /// stored for the account or repeats within `inserted`, or an error if
    /// the storage backend fails to write. Nothing is applied on error.
    fn commit_merge(
        &self,
        account: &AccountId,
        inserted: Vec<Transaction>,
        balance: Amount,
    ) -> Result<()>;

    /// Replaces a stored transaction (matched by account and ID) and stores
    /// the account's new cached balance, in one write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::TransactionNotFound`] if either is unknown, or an error
    /// if the storage backend fails to write. Nothing is applied on error.
    fn commit_edit(&self, account: &AccountId, transaction: Transaction, balance: Amount) -> Result<()>;

    /// Removes transactions of an account by their IDs and stores the
    /// account's new cached balance, in one write. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account is unknown, or
    /// an error if the storage backend fails to write. Nothing is applied on
    /// error.
    fn commit_delete(&self, account: &AccountId, ids: &[TransactionId], balance: Amount) -> Result<()>;

    /// Removes all stored data.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    fn clear(&self) -> Result<()>;
}

/// The complete stored state, shared by both backends.
///
/// The in-memory backend keeps one behind a mutex; the file backend
/// serializes it as a single JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tables {
    /// Stored accounts in insertion order.
    #[serde(default)]
    accounts: Vec<Account>,
    /// Transactions of every account in insertion order.
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl Tables {
    /// Finds an account by ID.
    fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == *id)
    }

    /// Finds an account by canonical key.
    fn account_by_key(&self, key: &AccountKey) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|account| account.key.as_ref() == Some(key))
    }

    /// Finds an account by ID for mutation.
    fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|account| account.id == *id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Fails with [`LedgerError::AccountNotFound`] unless the account is
    /// stored.
    fn require_account(&self, id: &AccountId) -> Result<()> {
        self.account(id)
            .map(|_found| ())
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Returns the history of one account.
    fn transactions(&self, account: &AccountId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|transaction| transaction.account == *account)
            .cloned()
            .collect()
    }

    /// Replaces accounts with matching IDs in place and appends new ones.
    fn upsert_accounts(&mut self, accounts: Vec<Account>) {
        for account in accounts {
            match self
                .accounts
                .iter_mut()
                .find(|existing| existing.id == account.id)
            {
                Some(existing) => *existing = account,
                None => self.accounts.push(account),
            }
        }
    }

    /// Appends merged transactions and updates the cached balance.
    ///
    /// IDs stay unique per account: a clash with a stored transaction or
    /// within `inserted` rejects the whole commit.
    fn commit_merge(
        &mut self,
        account: &AccountId,
        inserted: Vec<Transaction>,
        balance: Amount,
    ) -> Result<()> {
        self.require_account(account)?;
        let mut seen: HashSet<&TransactionId> = self
            .transactions
            .iter()
            .filter(|transaction| transaction.account == *account)
            .map(|transaction| &transaction.id)
            .collect();
        if let Some(clash) = inserted.iter().find(|transaction| !seen.insert(&transaction.id)) {
            return Err(LedgerError::DuplicateTransaction(clash.id.to_string()));
        }

        self.account_mut(account)?.balance = balance;
        self.transactions
            .extend(inserted.into_iter().map(|mut transaction| {
                transaction.account = account.clone();
                transaction
            }));
        Ok(())
    }

    /// Replaces the transaction with the same account and ID and updates
    /// the cached balance.
    fn commit_edit(
        &mut self,
        account: &AccountId,
        mut transaction: Transaction,
        balance: Amount,
    ) -> Result<()> {
        self.require_account(account)?;
        transaction.account = account.clone();
        let slot = self
            .transactions
            .iter_mut()
            .find(|existing| existing.account == *account && existing.id == transaction.id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction.id.to_string()))?;
        *slot = transaction;
        self.account_mut(account)?.balance = balance;
        Ok(())
    }

    /// Drops the listed transactions of one account and updates the cached
    /// balance.
    fn commit_delete(&mut self, account: &AccountId, ids: &[TransactionId], balance: Amount) -> Result<()> {
        self.account_mut(account)?.balance = balance;
        let id_set: HashSet<&TransactionId> = ids.iter().collect();
        self.transactions.retain(|transaction| {
            transaction.account != *account || !id_set.contains(&transaction.id)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, IdOrigin, TransactionType};
    use chrono::DateTime;

    fn wallet() -> Account {
        Account::manual(
            AccountId::from("wallet"),
            "Wallet".to_owned(),
            AccountType::Cash,
            None,
        )
    }

    fn transaction(id: &str, account: &str) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            id_origin: IdOrigin::Synthesized,
            account: AccountId::from(account),
            date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            amount: Amount::from_minor(-100),
            payee: "Kiosk".to_owned(),
            memo: None,
            kind: TransactionType::Debit,
            check_number: None,
        }
    }

    #[test]
    fn upsert_keeps_insertion_order() {
        let mut tables = Tables::default();
        let mut jar = wallet();
        jar.id = AccountId::from("jar");
        tables.upsert_accounts(vec![wallet(), jar]);

        let mut renamed = wallet();
        renamed.name = "Pocket".to_owned();
        tables.upsert_accounts(vec![renamed]);

        let names: Vec<&str> = tables.accounts.iter().map(|account| account.name.as_str()).collect();
        assert_eq!(names, ["Pocket", "Wallet"]);
    }

    #[test]
    fn commit_merge_requires_account() {
        let mut tables = Tables::default();
        let err = tables
            .commit_merge(&AccountId::from("missing"), vec![transaction("t", "missing")], Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
        assert!(tables.transactions.is_empty());
    }

    #[test]
    fn commit_merge_repoints_transactions() {
        let mut tables = Tables::default();
        tables.upsert_accounts(vec![wallet()]);
        tables
            .commit_merge(
                &AccountId::from("wallet"),
                vec![transaction("t", "elsewhere")],
                Amount::from_minor(-100),
            )
            .unwrap();
        assert_eq!(tables.transactions(&AccountId::from("wallet")).len(), 1);
        assert_eq!(tables.accounts[0].balance, Amount::from_minor(-100));
    }

    #[test]
    fn commit_merge_rejects_stored_id() {
        let mut tables = Tables::default();
        tables.upsert_accounts(vec![wallet()]);
        let wallet_id = AccountId::from("wallet");
        tables
            .commit_merge(&wallet_id, vec![transaction("t", "wallet")], Amount::from_minor(-100))
            .unwrap();

        let err = tables
            .commit_merge(
                &wallet_id,
                vec![transaction("u", "wallet"), transaction("t", "wallet")],
                Amount::from_minor(-300),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(ref id) if id == "t"));
        assert_eq!(tables.transactions(&wallet_id).len(), 1);
        assert_eq!(tables.accounts[0].balance, Amount::from_minor(-100));
    }

    #[test]
    fn commit_merge_rejects_repeated_id() {
        let mut tables = Tables::default();
        tables.upsert_accounts(vec![wallet()]);
        let err = tables
            .commit_merge(
                &AccountId::from("wallet"),
                vec![transaction("t", "wallet"), transaction("t", "wallet")],
                Amount::from_minor(-200),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(_)));
        assert!(tables.transactions.is_empty());
    }

    #[test]
    fn same_id_may_exist_in_other_accounts() {
        let mut tables = Tables::default();
        let mut jar = wallet();
        jar.id = AccountId::from("jar");
        tables.upsert_accounts(vec![wallet(), jar]);
        tables
            .commit_merge(&AccountId::from("wallet"), vec![transaction("t", "wallet")], Amount::ZERO)
            .unwrap();
        tables
            .commit_merge(&AccountId::from("jar"), vec![transaction("t", "jar")], Amount::ZERO)
            .unwrap();
        assert_eq!(tables.transactions.len(), 2);
    }

    #[test]
    fn commit_delete_only_touches_one_account() {
        let mut tables = Tables::default();
        let mut jar = wallet();
        jar.id = AccountId::from("jar");
        tables.upsert_accounts(vec![wallet(), jar]);
        tables.transactions = vec![transaction("t", "wallet"), transaction("t", "jar")];
        tables
            .commit_delete(&AccountId::from("wallet"), &[TransactionId::from("t")], Amount::ZERO)
            .unwrap();
        assert!(tables.transactions(&AccountId::from("wallet")).is_empty());
        assert_eq!(tables.transactions(&AccountId::from("jar")).len(), 1);
        assert_eq!(tables.accounts[0].balance, Amount::ZERO);
    }

    #[test]
    fn commit_delete_to_unknown_account_applies_nothing() {
        let mut tables = Tables::default();
        tables.transactions = vec![transaction("t", "a")];
        let err = tables
            .commit_delete(&AccountId::from("a"), &[TransactionId::from("t")], Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
        assert_eq!(tables.transactions.len(), 1);
    }

    #[test]
    fn commit_edit_updates_transaction_and_balance() {
        let mut tables = Tables::default();
        tables.upsert_accounts(vec![wallet()]);
        tables.transactions = vec![transaction("t", "wallet")];
        let mut edited = transaction("t", "wallet");
        edited.amount = Amount::from_minor(-250);
        tables
            .commit_edit(&AccountId::from("wallet"), edited, Amount::from_minor(-250))
            .unwrap();
        assert_eq!(tables.transactions[0].amount, Amount::from_minor(-250));
        assert_eq!(tables.accounts[0].balance, Amount::from_minor(-250));
    }

    #[test]
    fn commit_edit_of_unknown_transaction_applies_nothing() {
        let mut tables = Tables::default();
        tables.upsert_accounts(vec![wallet()]);
        let err = tables
            .commit_edit(&AccountId::from("wallet"), transaction("t", "wallet"), Amount::from_minor(7))
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransactionNotFound(_)));
        assert_eq!(tables.accounts[0].balance, Amount::ZERO);
    }
}
