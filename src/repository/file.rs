//! JSON-file-based repository backend.
//!
//! Stores the whole ledger as one JSON document under a configurable
//! directory (default: `$XDG_DATA_HOME/ofx-ledger/`).

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::{Repository, Tables};
use crate::error::{LedgerError, Result};
use crate::models::{Account, AccountId, AccountKey, Amount, Transaction, TransactionId};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "ofx-ledger";

/// File holding accounts and transactions.
const LEDGER_FILE: &str = "ledger.json";
/// Empty file other processes lock before touching `ledger.json`.
const LOCK_FILE: &str = "ledger.lock";

/// File-backed repository that persists the ledger as JSON.
///
/// Accounts and transactions live in a single `ledger.json`, so a merge's
/// inserted transactions and the account's cached balance are written
/// together by one rename.
///
/// # Concurrency
///
/// Callers in one process queue on a [`Mutex`]; other processes are kept
/// out by an advisory lock on `ledger.lock`. Lookups hold the lock shared,
/// and every write holds it exclusively from the read of `ledger.json`
/// until the rename of its replacement.
///
/// # File layout
///
/// ```text
/// <dir>/
///   ledger.json   accounts and transactions
///   ledger.lock   advisory lock target
/// ```
#[derive(Debug)]
pub struct FileRepository {
    /// Root directory containing the ledger file.
    dir: PathBuf,
    /// Queues callers within this process.
    lock: Mutex<()>,
    /// Handle on `ledger.lock`.
    lock_file: fs::File,
}

impl FileRepository {
    /// Creates a new file repository rooted at the given directory.
    ///
    /// Missing directories are created, as is the `ledger.lock` file.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the directory or `ledger.lock`
    /// cannot be created.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the per-user directory ledgers are kept in by default.
    ///
    /// On Linux: `$XDG_DATA_HOME/ofx-ledger/` (typically
    /// `~/.local/share/ofx-ledger/`).
    ///
    /// # Errors
    ///
    /// Fails when the platform reports no data directory.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                LedgerError::Storage("could not determine platform data directory".into())
            })
    }

    /// Returns the directory this repository writes to.
    #[inline]
    #[must_use]
    pub const fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Joins `name` onto the ledger directory.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Runs `op` under the process mutex and a shared lock on `ledger.lock`.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // An unlock failure is reported only when `op` itself succeeded.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Runs `op` under the process mutex and an exclusive lock on
    /// `ledger.lock`.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads the ledger document. Returns empty tables if the file does
    /// not exist.
    fn read_tables(&self) -> Result<Tables> {
        match fs::read_to_string(self.path(LEDGER_FILE)) {
            Ok(contents) => serde_json::from_str(&contents).map_err(LedgerError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Tables::default()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Atomically writes the ledger document (write-to-tmp then rename).
    fn write_tables(&self, tables: &Tables) -> Result<()> {
        let path = self.path(LEDGER_FILE);
        let tmp_path = self.path(&format!("{LEDGER_FILE}.tmp"));
        let json = serde_json::to_string_pretty(tables).map_err(LedgerError::from)?;
        fs::write(&tmp_path, json).map_err(storage_io_error)?;
        fs::rename(&tmp_path, &path).map_err(storage_io_error)?;
        Ok(())
    }

    /// Reads the tables under a shared lock and applies `op`.
    fn read<R, F: FnOnce(Tables) -> R>(&self, op: F) -> Result<R> {
        self.with_shared_lock(|| self.read_tables().map(op))
    }

    /// Reads, mutates and rewrites the tables under an exclusive lock.
    ///
    /// Nothing is written if `op` fails.
    fn update<F: FnOnce(&mut Tables) -> Result<()>>(&self, op: F) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut tables = self.read_tables()?;
            op(&mut tables)?;
            self.write_tables(&tables)
        })
    }

    /// Deletes `ledger.json`, keeping `ledger.lock` in place.
    fn clear_all(&self) -> Result<()> {
        self.with_exclusive_lock(|| match fs::remove_file(self.path(LEDGER_FILE)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_io_error(err)),
        })
    }
}

/// Wraps an I/O error into a [`LedgerError::Storage`].
fn storage_io_error(err: std::io::Error) -> LedgerError {
    LedgerError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`LedgerError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::Storage(err.to_string().into())
}

impl Repository for FileRepository {
    #[inline]
    fn accounts(&self) -> Result<Vec<Account>> {
        self.read(|tables| tables.accounts)
    }

    #[inline]
    fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.read(|tables| tables.account(id).cloned())
    }

    #[inline]
    fn account_by_key(&self, key: &AccountKey) -> Result<Option<Account>> {
        self.read(|tables| tables.account_by_key(key).cloned())
    }

    #[inline]
    fn upsert_accounts(&self, accounts: Vec<Account>) -> Result<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        self.update(|tables| {
            tables.upsert_accounts(accounts);
            Ok(())
        })
    }

    #[inline]
    fn transactions(&self, account: &AccountId) -> Result<Vec<Transaction>> {
        self.read(|tables| tables.transactions(account))
    }

    #[inline]
    fn commit_merge(
        &self,
        account: &AccountId,
        inserted: Vec<Transaction>,
        balance: Amount,
    ) -> Result<()> {
        self.update(|tables| tables.commit_merge(account, inserted, balance))
    }

    #[inline]
    fn commit_edit(&self, account: &AccountId, transaction: Transaction, balance: Amount) -> Result<()> {
        self.update(|tables| tables.commit_edit(account, transaction, balance))
    }

    #[inline]
    fn commit_delete(&self, account: &AccountId, ids: &[TransactionId], balance: Amount) -> Result<()> {
        self.update(|tables| tables.commit_delete(account, ids, balance))
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.clear_all()
    }
}
