//! Canonical statement model.

use chrono::{DateTime, FixedOffset};

use super::{Account, Amount, Transaction};

/// One reporting period for one account, as returned by an institution.
///
/// Statements are transient: they are built from a protocol response and
/// consumed by a merge. Only their transactions are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Account the statement belongs to, in canonical form.
    pub account: Account,
    /// ISO 4217 currency code of amounts in this statement.
    pub currency: String,
    /// Start of the reported period.
    pub start: DateTime<FixedOffset>,
    /// End of the reported period.
    pub end: DateTime<FixedOffset>,
    /// Institution-reported ledger balance, kept as a reconciliation checkpoint.
    pub ledger_balance: Amount,
    /// Institution-reported available balance.
    pub available_balance: Option<Amount>,
    /// Transactions in the order the institution reported them.
    pub transactions: Vec<Transaction>,
    /// Records that could not be normalized.
    pub skipped: Vec<SkippedTransaction>,
}

impl Statement {
    /// Returns `true` if `date` falls on a calendar day within the period.
    ///
    /// Days are compared in the offsets of `start` and `end`, so a date-only
    /// `DTEND` still covers everything posted later that day.
    #[inline]
    #[must_use]
    pub fn covers(&self, date: &DateTime<FixedOffset>) -> bool {
        let first_day = self.start.date_naive();
        let last_day = self.end.date_naive();
        date.with_timezone(self.start.offset()).date_naive() >= first_day
            && date.with_timezone(self.end.offset()).date_naive() <= last_day
    }
}

/// A transaction record dropped while building a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTransaction {
    /// Position of the record within the source transaction list.
    pub ordinal: usize,
    /// Institution transaction id, if the record carried one.
    pub fit_id: Option<String>,
    /// Why the record was dropped.
    pub reason: String,
}

/// A response dropped while building statements from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedResponse {
    /// Element name of the dropped response or message set.
    pub kind: String,
    /// Why the response was dropped.
    pub reason: String,
}
