//! High-level ledger service on top of a [`Repository`].
//!
//! [`Ledger`] ties the pipeline together: it builds statements from an OFX
//! response, resolves each statement's account against the repository,
//! merges the transactions and persists the result. Mutations of one
//! account are serialized; different accounts proceed in parallel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, NaiveDate};
use dashmap::DashMap;

use crate::builder::{Statements, build_statements};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::merge::{MergeResult, Merger, closing_balance, daily_balances, recompute_balances};
use crate::models::{
    Account, AccountId, AccountType, Amount, BalanceSummary, CredentialId, DailyBalance,
    IdOrigin, LedgerEntry, SkippedResponse, SkippedTransaction, Statement, Transaction,
    TransactionId, TransactionType,
};
use crate::normalizer::{account_identity, synthesize_id};
use crate::protocol::OfxResponse;
use crate::repository::Repository;
use crate::resolver::enumerate_accounts;

/// Prefix of generated manual account identifiers.
const MANUAL_ACCOUNT_PREFIX: &str = "manual-";

/// A transaction entered by hand into a manual account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntry {
    /// Posting instant.
    pub date: DateTime<FixedOffset>,
    /// Signed amount in minor units.
    pub amount: Amount,
    /// Payee or description.
    pub payee: String,
    /// Free-text memo.
    pub memo: Option<String>,
    /// Transaction type.
    pub kind: TransactionType,
    /// Cheque number.
    pub check_number: Option<String>,
}

/// Outcome of merging one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOutcome {
    /// Account the statement was merged into.
    pub account: AccountId,
    /// Merge result.
    pub merge: MergeResult,
    /// Records of the statement that could not be normalized.
    pub skipped: Vec<SkippedTransaction>,
}

/// Outcome of importing a whole OFX response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// One entry per statement merged, in response order.
    pub statements: Vec<StatementOutcome>,
    /// Responses that produced no statement.
    pub skipped: Vec<SkippedResponse>,
}

impl ImportReport {
    /// Number of transactions inserted across all statements.
    #[inline]
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.statements
            .iter()
            .map(|outcome| outcome.merge.inserted.len())
            .sum()
    }

    /// Number of incoming transactions recognized as duplicates.
    #[inline]
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.statements
            .iter()
            .map(|outcome| outcome.merge.duplicates.len())
            .sum()
    }

    /// Number of transaction records that could not be normalized.
    #[inline]
    #[must_use]
    pub fn skipped_transactions(&self) -> usize {
        self.statements
            .iter()
            .map(|outcome| outcome.skipped.len())
            .sum()
    }
}

/// Builder for [`Ledger`].
#[derive(Debug)]
pub struct LedgerBuilder<R: Repository> {
    /// Repository backend.
    repository: Option<R>,
    /// Normalization and merge settings.
    config: Config,
}

impl<R: Repository> LedgerBuilder<R> {
    /// Sets the repository backend.
    #[inline]
    #[must_use]
    pub fn repository(mut self, repository: R) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Overrides the default configuration.
    #[inline]
    #[must_use]
    pub const fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if no repository was provided, or
    /// [`LedgerError::Serialization`] if the configuration is invalid.
    #[inline]
    pub fn build(self) -> Result<Ledger<R>> {
        let repository = self
            .repository
            .ok_or_else(|| LedgerError::Storage("repository backend is required".into()))?;
        self.config.validate()?;
        Ok(Ledger {
            repository,
            merger: Merger::new(self.config.dedup),
            config: self.config,
            locks: DashMap::new(),
        })
    }
}

/// Account ledger backed by a repository.
#[derive(Debug)]
pub struct Ledger<R: Repository> {
    /// Repository backend.
    repository: R,
    /// Normalization and merge settings.
    config: Config,
    /// Merge engine configured from `config`.
    merger: Merger,
    /// Per-account exclusive sections.
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl<R: Repository> Ledger<R> {
    /// Creates a new builder for configuring the ledger.
    #[inline]
    #[must_use]
    pub fn builder() -> LedgerBuilder<R> {
        LedgerBuilder {
            repository: None,
            config: Config::default(),
        }
    }

    /// Returns the active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the repository backend.
    #[inline]
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Builds the statements of `response` with this ledger's configuration.
    #[inline]
    #[must_use]
    pub fn statements<'a>(&self, response: &'a OfxResponse) -> Statements<'a> {
        build_statements(response, &self.config)
    }

    /// Merges every statement of a downloaded response into the account it
    /// belongs to.
    ///
    /// Accounts are looked up by canonical key. An account seen for the
    /// first time is created, linked to `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails. Statements merged before
    /// the failure stay merged.
    #[tracing::instrument(skip_all)]
    pub fn sync(&self, response: &OfxResponse, credential: Option<&CredentialId>) -> Result<ImportReport> {
        let (statements, skipped) = self.statements(response).into_parts();
        let mut report = ImportReport {
            statements: Vec::with_capacity(statements.len()),
            skipped,
        };
        for statement in statements {
            let resolved = self.with_account_lock(&statement.account.id, || {
                self.resolve_or_create(&statement, credential)
            })?;
            let outcome = self.with_account_lock(&resolved.id, || {
                let account = self.require_account(&resolved.id)?;
                self.merge_locked(&account, &statement)
            })?;
            report.statements.push(outcome);
        }
        tracing::info!(
            statements = report.statements.len(),
            inserted = report.inserted(),
            duplicates = report.duplicates(),
            skipped = report.skipped.len(),
            "sync finished"
        );
        Ok(report)
    }

    /// Merges every statement of an imported file into one chosen account,
    /// ignoring the account identity the file itself reports.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if `account_id` is unknown,
    /// or an error if the repository fails.
    #[tracing::instrument(skip_all, fields(account = %account_id))]
    pub fn import_into(&self, account_id: &AccountId, response: &OfxResponse) -> Result<ImportReport> {
        let (statements, skipped) = self.statements(response).into_parts();
        let mut report = ImportReport {
            statements: Vec::with_capacity(statements.len()),
            skipped,
        };
        for statement in statements {
            let outcome = self.with_account_lock(account_id, || {
                let account = self.require_account(account_id)?;
                if account
                    .currency
                    .as_ref()
                    .is_some_and(|currency| !currency.eq_ignore_ascii_case(&statement.currency))
                {
                    tracing::warn!(
                        account = %account.id,
                        account_currency = account.currency.as_deref().unwrap_or_default(),
                        statement_currency = %statement.currency,
                        "importing a statement in a different currency"
                    );
                }
                self.merge_locked(&account, &statement)
            })?;
            report.statements.push(outcome);
        }
        tracing::info!(
            statements = report.statements.len(),
            inserted = report.inserted(),
            duplicates = report.duplicates(),
            "import finished"
        );
        Ok(report)
    }

    /// Merges one already-built statement into `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if `account_id` is unknown,
    /// or an error if the repository fails.
    #[tracing::instrument(skip_all, fields(account = %account_id))]
    pub fn merge_statement(&self, account_id: &AccountId, statement: &Statement) -> Result<MergeResult> {
        self.with_account_lock(account_id, || {
            let account = self.require_account(account_id)?;
            self.merge_locked(&account, statement)
                .map(|outcome| outcome.merge)
        })
    }

    /// Returns the accounts listed by a signup response that are not stored
    /// yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails to read.
    #[tracing::instrument(skip_all)]
    pub fn discover_accounts(&self, response: &OfxResponse) -> Result<Vec<Account>> {
        let mut discovered = Vec::new();
        for account in enumerate_accounts(response) {
            let known = match account.key.as_ref() {
                Some(key) => self.repository.account_by_key(key)?.is_some(),
                None => self.repository.account(&account.id)?.is_some(),
            };
            if !known {
                discovered.push(account);
            }
        }
        tracing::debug!(count = discovered.len(), "discovered new accounts");
        Ok(discovered)
    }

    /// Stores accounts, typically a selection of [`Self::discover_accounts`].
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails to write.
    #[inline]
    pub fn add_accounts(&self, accounts: Vec<Account>) -> Result<()> {
        self.repository.upsert_accounts(accounts)
    }

    /// Creates a manually maintained account.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    #[tracing::instrument(skip_all)]
    pub fn add_manual_account(
        &self,
        name: &str,
        kind: AccountType,
        currency: Option<&str>,
    ) -> Result<Account> {
        let existing = self.repository.accounts()?;
        let id = (1_usize..)
            .map(|ordinal| AccountId::new(format!("{MANUAL_ACCOUNT_PREFIX}{ordinal}")))
            .find(|candidate| existing.iter().all(|account| account.id != *candidate))
            .ok_or_else(|| LedgerError::Storage("manual account ids exhausted".into()))?;
        let account = Account::manual(
            id,
            name.trim().to_owned(),
            kind,
            currency.map(str::to_ascii_uppercase),
        );
        self.repository.upsert_accounts(vec![account.clone()])?;
        tracing::info!(account = %account.id, name = %account.name, "created manual account");
        Ok(account)
    }

    /// Returns all stored accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails to read.
    #[inline]
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.repository.accounts()
    }

    /// Looks up an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails to read.
    #[inline]
    pub fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.repository.account(id)
    }

    /// Adds a hand-entered transaction to an account without an institution
    /// link.
    ///
    /// The transaction id is synthesized from the entry and an ordinal,
    /// starting at the history length and skipping ordinals whose id is
    /// already taken in the account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if `account_id` is unknown,
    /// [`LedgerError::ManualEntryNotAllowed`] if the account is linked to an
    /// institution credential, or an error if the repository fails.
    #[tracing::instrument(skip_all, fields(account = %account_id))]
    pub fn add_transaction(&self, account_id: &AccountId, entry: ManualEntry) -> Result<Transaction> {
        self.with_account_lock(account_id, || {
            let account = self.require_account(account_id)?;
            if !account.is_manual() {
                return Err(LedgerError::ManualEntryNotAllowed(account_id.to_string()));
            }
            let history = self.repository.transactions(account_id)?;
            let payee = entry.payee.trim().to_owned();
            let identity = account_identity(&account);
            let taken: HashSet<&TransactionId> = history.iter().map(|existing| &existing.id).collect();
            let id = (history.len()..)
                .map(|ordinal| synthesize_id(&identity, &entry.date, entry.amount, &payee, ordinal))
                .find(|candidate| !taken.contains(candidate))
                .ok_or_else(|| LedgerError::Storage("transaction ids exhausted".into()))?;
            let transaction = Transaction {
                id,
                id_origin: IdOrigin::Synthesized,
                account: account.id.clone(),
                date: entry.date,
                amount: entry.amount,
                payee,
                memo: entry.memo,
                kind: checked_kind(&account.id, entry.kind, entry.amount),
                check_number: entry.check_number,
            };
            let entries = recompute_balances(
                history
                    .into_iter()
                    .chain(core::iter::once(transaction.clone()))
                    .collect(),
            );
            self.repository.commit_merge(
                account_id,
                vec![transaction.clone()],
                closing_balance(&entries),
            )?;
            tracing::info!(transaction = %transaction.id, "added manual transaction");
            Ok(transaction)
        })
    }

    /// Replaces a stored transaction with an edited version (matched by ID)
    /// and recomputes running balances.
    ///
    /// Returns the recomputed history.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::TransactionNotFound`] if either is unknown, or an
    /// error if the repository fails.
    #[tracing::instrument(skip_all, fields(account = %account_id))]
    pub fn edit_transaction(
        &self,
        account_id: &AccountId,
        mut transaction: Transaction,
    ) -> Result<Vec<LedgerEntry>> {
        self.with_account_lock(account_id, || {
            let account = self.require_account(account_id)?;
            let mut history = self.repository.transactions(account_id)?;
            let slot = history
                .iter_mut()
                .find(|existing| existing.id == transaction.id)
                .ok_or_else(|| LedgerError::TransactionNotFound(transaction.id.to_string()))?;
            transaction.account.clone_from(&account.id);
            transaction.kind = checked_kind(&account.id, transaction.kind, transaction.amount);
            slot.clone_from(&transaction);

            let entries = recompute_balances(history);
            self.repository
                .commit_edit(account_id, transaction, closing_balance(&entries))?;
            Ok(entries)
        })
    }

    /// Deletes a transaction and recomputes running balances.
    ///
    /// Returns the recomputed history.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::TransactionNotFound`] if either is unknown, or an
    /// error if the repository fails.
    #[tracing::instrument(skip_all, fields(account = %account_id))]
    pub fn delete_transaction(
        &self,
        account_id: &AccountId,
        transaction_id: &TransactionId,
    ) -> Result<Vec<LedgerEntry>> {
        self.with_account_lock(account_id, || {
            let _account = self.require_account(account_id)?;
            let mut history = self.repository.transactions(account_id)?;
            let before = history.len();
            history.retain(|existing| existing.id != *transaction_id);
            if history.len() == before {
                return Err(LedgerError::TransactionNotFound(transaction_id.to_string()));
            }

            let entries = recompute_balances(history);
            self.repository.commit_delete(
                account_id,
                core::slice::from_ref(transaction_id),
                closing_balance(&entries),
            )?;
            tracing::info!(transaction = %transaction_id, "deleted transaction");
            Ok(entries)
        })
    }

    /// Returns the account's history ordered by date, with running balances.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if `account_id` is unknown,
    /// or an error if the repository fails to read.
    #[inline]
    pub fn history(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        let _account = self.require_account(account_id)?;
        Ok(recompute_balances(self.repository.transactions(account_id)?))
    }

    /// Returns the history entries dated within `[from, to]` (calendar days
    /// in each transaction's own offset). Running balances still account
    /// for everything before `from`.
    ///
    /// # Errors
    ///
    /// See [`Self::history`].
    #[inline]
    pub fn history_between(
        &self,
        account_id: &AccountId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.history(account_id)?;
        entries.retain(|entry| {
            let day = entry.transaction.date.date_naive();
            from.is_none_or(|start| day >= start) && to.is_none_or(|end| day <= end)
        });
        Ok(entries)
    }

    /// Returns the closing balance of every day from the first transaction
    /// through `through`.
    ///
    /// # Errors
    ///
    /// See [`Self::history`].
    #[inline]
    pub fn daily_balances(&self, account_id: &AccountId, through: NaiveDate) -> Result<Vec<DailyBalance>> {
        Ok(daily_balances(&self.history(account_id)?, through))
    }

    /// Summarizes daily closing balances from `since` through `through`.
    ///
    /// Returns `None` if the account has no activity by `through`.
    ///
    /// # Errors
    ///
    /// See [`Self::history`].
    #[inline]
    pub fn balance_summary(
        &self,
        account_id: &AccountId,
        since: NaiveDate,
        through: NaiveDate,
    ) -> Result<Option<BalanceSummary>> {
        let daily = self.daily_balances(account_id, through)?;
        Ok(BalanceSummary::over(&daily, since))
    }

    /// Runs `op` inside the exclusive section of one account.
    fn with_account_lock<T, F: FnOnce() -> Result<T>>(&self, account_id: &AccountId, op: F) -> Result<T> {
        let lock = Arc::clone(self.locks.entry(account_id.clone()).or_default().value());
        let _guard = lock
            .lock()
            .map_err(|err| LedgerError::Storage(err.to_string().into()))?;
        op()
    }

    /// Loads an account or fails with [`LedgerError::AccountNotFound`].
    fn require_account(&self, account_id: &AccountId) -> Result<Account> {
        self.repository
            .account(account_id)?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// Finds the stored account a statement belongs to, creating it on
    /// first sight. Must be called inside the account's exclusive section.
    fn resolve_or_create(&self, statement: &Statement, credential: Option<&CredentialId>) -> Result<Account> {
        let stored = match statement.account.key.as_ref() {
            Some(key) => self.repository.account_by_key(key)?,
            None => self.repository.account(&statement.account.id)?,
        };
        let Some(mut account) = stored else {
            let mut created = statement.account.clone();
            created.credential = credential.cloned();
            self.repository.upsert_accounts(vec![created.clone()])?;
            tracing::info!(account = %created.id, "created account from statement");
            return Ok(created);
        };

        let mut changed = false;
        if account.credential.is_none()
            && let Some(link) = credential
        {
            account.credential = Some(link.clone());
            changed = true;
        }
        if account.currency.is_none() {
            account.currency = Some(statement.currency.clone());
            changed = true;
        }
        if changed {
            self.repository.upsert_accounts(vec![account.clone()])?;
        }
        Ok(account)
    }

    /// Merges and persists one statement. Must be called inside the
    /// account's exclusive section.
    fn merge_locked(&self, account: &Account, statement: &Statement) -> Result<StatementOutcome> {
        let history = self.repository.transactions(&account.id)?;
        let merge = self.merger.merge(account, statement, &history);
        if !merge.is_noop() || merge.balance != account.balance {
            self.repository
                .commit_merge(&account.id, merge.inserted.clone(), merge.balance)?;
        }
        Ok(StatementOutcome {
            account: account.id.clone(),
            merge,
            skipped: statement.skipped.clone(),
        })
    }
}

/// Downgrades `kind` to [`TransactionType::Other`] when `amount` has a sign
/// it does not allow.
fn checked_kind(account: &AccountId, kind: TransactionType, amount: Amount) -> TransactionType {
    if kind.admits(amount) {
        return kind;
    }
    tracing::warn!(
        account = %account,
        kind = ?kind,
        amount = %amount,
        "amount sign contradicts transaction type, recording as other"
    );
    TransactionType::Other
}
