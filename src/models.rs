//! Canonical, institution-agnostic data models.
//!
//! This module contains the account, transaction and statement types the
//! normalization pipeline produces, newtype ID wrappers, and the
//! fixed-point [`Amount`].

mod account;
mod amount;
mod balance;
mod enums;
mod ids;
mod statement;
mod transaction;

pub use account::{Account, AccountKey};
pub use amount::{Amount, DEFAULT_FRACTION_DIGITS};
pub use balance::{BalanceDiscrepancy, BalanceSummary, DailyBalance, LedgerEntry};
pub use chrono::{DateTime, FixedOffset, NaiveDate};
pub use enums::{AccountType, IdOrigin, TransactionType};
pub use ids::{AccountId, CredentialId, InstitutionId, TransactionId};
pub use statement::{SkippedResponse, SkippedTransaction, Statement};
pub use transaction::Transaction;
