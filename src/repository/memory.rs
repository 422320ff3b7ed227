//! In-memory repository backend.
//!
//! Provides [`InMemoryRepository`], a thread-safe implementation of
//! [`super::Repository`] for tests and for callers that persist elsewhere.

use std::sync::Mutex;

use super::{Repository, Tables};
use crate::error::{LedgerError, Result};
use crate::models::{Account, AccountId, AccountKey, Amount, Transaction, TransactionId};

/// Thread-safe in-memory repository.
///
/// # Example
///
/// ```rust
/// use ofx_ledger::ledger::Ledger;
/// use ofx_ledger::repository::InMemoryRepository;
///
/// let ledger = Ledger::builder()
///     .repository(InMemoryRepository::new())
///     .build()
///     .unwrap();
/// assert!(ledger.accounts().unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Tables>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R, F: FnOnce(&mut Tables) -> R>(&self, op: F) -> Result<R> {
        let mut tables = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(op(&mut tables))
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::Storage(err.to_string().into())
}

impl Repository for InMemoryRepository {
    #[inline]
    fn accounts(&self) -> Result<Vec<Account>> {
        self.with_lock(|tables| tables.accounts.clone())
    }

    #[inline]
    fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.with_lock(|tables| tables.account(id).cloned())
    }

    #[inline]
    fn account_by_key(&self, key: &AccountKey) -> Result<Option<Account>> {
        self.with_lock(|tables| tables.account_by_key(key).cloned())
    }

    #[inline]
    fn upsert_accounts(&self, accounts: Vec<Account>) -> Result<()> {
        self.with_lock(|tables| tables.upsert_accounts(accounts))
    }

    #[inline]
    fn transactions(&self, account: &AccountId) -> Result<Vec<Transaction>> {
        self.with_lock(|tables| tables.transactions(account))
    }

    #[inline]
    fn commit_merge(
        &self,
        account: &AccountId,
        inserted: Vec<Transaction>,
        balance: Amount,
    ) -> Result<()> {
        self.with_lock(|tables| tables.commit_merge(account, inserted, balance))?
    }

    #[inline]
    fn commit_edit(&self, account: &AccountId, transaction: Transaction, balance: Amount) -> Result<()> {
        self.with_lock(|tables| tables.commit_edit(account, transaction, balance))?
    }

    #[inline]
    fn commit_delete(&self, account: &AccountId, ids: &[TransactionId], balance: Amount) -> Result<()> {
        self.with_lock(|tables| tables.commit_delete(account, ids, balance))?
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.with_lock(|tables| *tables = Tables::default())
    }
}
