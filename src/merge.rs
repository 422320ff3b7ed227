//! Merge and reconciliation engine.
//!
//! [`Merger::merge`] folds one statement into an account's existing history:
//! duplicates are recognized and set aside, new transactions are appended
//! in the order the institution reported them, and running balances are
//! recomputed over the whole history. The result is computed entirely in
//! memory; persisting it is the caller's job.
//!
//! Duplicate detection uses two rules, in priority order:
//!
//! 1. Same transaction id within the account.
//! 2. When either side lacks an institution-supplied id: exact match of the
//!    fields selected by [`DedupPolicy`] (calendar date, amount, payee),
//!    both dated within the statement range. Each existing transaction can
//!    absorb at most one incoming record, so two identical records in one
//!    statement are never collapsed into one.
//!
//! Anything that matches neither rule is inserted.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::config::DedupPolicy;
use crate::models::{
    Account, Amount, BalanceDiscrepancy, DailyBalance, LedgerEntry, Statement, Transaction,
    TransactionId,
};

/// Which rule recognized a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Same transaction id.
    Id,
    /// Same date, amount and payee (as configured).
    Fields,
}

/// An incoming transaction recognized as already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// The incoming transaction that was not inserted.
    pub incoming: Transaction,
    /// Id of the existing transaction it matched.
    pub existing: TransactionId,
    /// Rule that matched.
    pub rule: MatchRule,
}

/// Outcome of merging one statement into an account history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Transactions to insert, in institution order.
    pub inserted: Vec<Transaction>,
    /// Incoming transactions recognized as duplicates.
    pub duplicates: Vec<Duplicate>,
    /// Full history after the merge, date-ordered, with running balances.
    pub history: Vec<LedgerEntry>,
    /// Account balance after the merge.
    pub balance: Amount,
    /// Mismatch against the institution's ledger balance, if any.
    pub discrepancy: Option<BalanceDiscrepancy>,
}

impl MergeResult {
    /// Returns `true` if the merge inserts nothing.
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty()
    }
}

/// Merge engine configured with a duplicate policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Merger {
    /// Fields compared by the fallback rule.
    policy: DedupPolicy,
}

impl Merger {
    /// Creates a merger with the given fallback policy.
    #[inline]
    #[must_use]
    pub const fn new(policy: DedupPolicy) -> Self {
        Self { policy }
    }

    /// Merges `statement` into `history`, the account's current transactions
    /// in insertion order.
    ///
    /// Inserted transactions are re-pointed at `account`, so a statement
    /// built for one account can be imported into another.
    #[must_use]
    pub fn merge(&self, account: &Account, statement: &Statement, history: &[Transaction]) -> MergeResult {
        let positions: HashMap<&TransactionId, usize> = history
            .iter()
            .enumerate()
            .map(|(position, existing)| (&existing.id, position))
            .collect();
        let mut claimed = vec![false; history.len()];
        let id_matches: Vec<bool> = statement
            .transactions
            .iter()
            .map(|incoming| match positions.get(&incoming.id) {
                Some(&position) => {
                    if let Some(slot) = claimed.get_mut(position) {
                        *slot = true;
                    }
                    true
                }
                None => false,
            })
            .collect();

        let mut known_ids: HashSet<TransactionId> =
            history.iter().map(|existing| existing.id.clone()).collect();
        let mut inserted: Vec<Transaction> = Vec::new();
        let mut duplicates = Vec::new();

        for (incoming, id_match) in statement.transactions.iter().zip(id_matches) {
            let mut candidate = incoming.clone();
            candidate.account.clone_from(&account.id);

            if id_match || known_ids.contains(&candidate.id) {
                if !id_match {
                    tracing::warn!(
                        account = %account.id,
                        transaction = %candidate.id,
                        "statement repeats a transaction id"
                    );
                }
                duplicates.push(Duplicate {
                    existing: candidate.id.clone(),
                    incoming: candidate,
                    rule: MatchRule::Id,
                });
                continue;
            }
            let fallback = self
                .fallback_match(statement, &candidate, history, &claimed)
                .and_then(|position| Some((claimed.get_mut(position)?, history.get(position)?)));
            if let Some((slot, existing)) = fallback {
                *slot = true;
                duplicates.push(Duplicate {
                    existing: existing.id.clone(),
                    incoming: candidate,
                    rule: MatchRule::Fields,
                });
                continue;
            }
            let _new = known_ids.insert(candidate.id.clone());
            inserted.push(candidate);
        }

        let entries = recompute_balances(history.iter().chain(&inserted).cloned().collect());
        let balance = closing_balance(&entries);
        let discrepancy = reconcile(account, statement, &entries);
        tracing::debug!(
            account = %account.id,
            inserted = inserted.len(),
            duplicates = duplicates.len(),
            balance = %balance,
            "merged statement"
        );

        MergeResult {
            inserted,
            duplicates,
            history: entries,
            balance,
            discrepancy,
        }
    }

    /// Finds an unclaimed existing transaction matching `incoming` by the
    /// fallback rule.
    fn fallback_match(
        &self,
        statement: &Statement,
        incoming: &Transaction,
        history: &[Transaction],
        claimed: &[bool],
    ) -> Option<usize> {
        let policy = self.policy;
        if !(policy.match_date || policy.match_amount || policy.match_payee)
            || !statement.covers(&incoming.date)
        {
            return None;
        }
        history.iter().zip(claimed).position(|(existing, &taken)| {
            !taken
                && !(existing.has_stable_id() && incoming.has_stable_id())
                && statement.covers(&existing.date)
                && (!policy.match_date || existing.date.date_naive() == incoming.date.date_naive())
                && (!policy.match_amount || existing.amount == incoming.amount)
                && (!policy.match_payee || existing.payee == incoming.payee)
        })
    }
}

/// Merges with the default policy. See [`Merger::merge`].
#[inline]
#[must_use]
pub fn merge(account: &Account, statement: &Statement, history: &[Transaction]) -> MergeResult {
    Merger::default().merge(account, statement, history)
}

/// Orders `transactions` by date and assigns running balances seeded at zero.
///
/// The sort is stable, so transactions sharing an instant keep their
/// insertion order. A running balance that overflows is clamped to the
/// representable range and logged.
#[must_use]
pub fn recompute_balances(mut transactions: Vec<Transaction>) -> Vec<LedgerEntry> {
    transactions.sort_by_key(|transaction| transaction.date);
    let mut running_balance = Amount::ZERO;
    transactions
        .into_iter()
        .map(|transaction| {
            running_balance = running_balance
                .checked_add(transaction.amount)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        account = %transaction.account,
                        transaction = %transaction.id,
                        balance = %running_balance,
                        amount = %transaction.amount,
                        "running balance overflowed, clamping"
                    );
                    running_balance + transaction.amount
                });
            LedgerEntry {
                transaction,
                running_balance,
            }
        })
        .collect()
}

/// Returns the running balance after the last entry, or zero.
#[inline]
#[must_use]
pub fn closing_balance(entries: &[LedgerEntry]) -> Amount {
    entries.last().map_or(Amount::ZERO, |entry| entry.running_balance)
}

/// Closing balance of every calendar day from the first entry through
/// `through`, carrying the balance over days without activity.
///
/// Days are taken in each transaction's own offset. Entries after
/// `through` are ignored.
#[must_use]
pub fn daily_balances(entries: &[LedgerEntry], through: NaiveDate) -> Vec<DailyBalance> {
    let Some(first) = entries.first() else {
        return Vec::new();
    };
    let mut daily = Vec::new();
    let mut remaining = entries.iter().peekable();
    let mut balance = Amount::ZERO;
    for date in first.transaction.date.date_naive().iter_days() {
        if date > through {
            break;
        }
        while let Some(entry) = remaining.next_if(|entry| entry.transaction.date.date_naive() <= date) {
            balance = entry.running_balance;
        }
        daily.push(DailyBalance { date, balance });
    }
    daily
}

/// Compares the recomputed balance at the statement's end date with the
/// institution's ledger balance, logging any mismatch.
fn reconcile(account: &Account, statement: &Statement, entries: &[LedgerEntry]) -> Option<BalanceDiscrepancy> {
    let offset = statement.end.offset();
    let end_day = statement.end.date_naive();
    let computed = entries
        .iter()
        .take_while(|entry| entry.transaction.date.with_timezone(offset).date_naive() <= end_day)
        .last()
        .map_or(Amount::ZERO, |entry| entry.running_balance);
    if computed == statement.ledger_balance {
        return None;
    }
    let discrepancy = BalanceDiscrepancy {
        as_of: statement.end,
        computed,
        reported: statement.ledger_balance,
    };
    tracing::warn!(
        account = %account.id,
        as_of = %statement.end,
        computed = %computed,
        reported = %statement.ledger_balance,
        difference = %discrepancy.difference(),
        "recomputed balance differs from the institution's ledger balance"
    );
    Some(discrepancy)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset};

    use super::*;
    use crate::models::{AccountKey, AccountType, IdOrigin, InstitutionId, TransactionType};

    fn account() -> Account {
        Account::resolved(AccountKey {
            institution: Some(InstitutionId::from("121000248")),
            number: "1234".to_owned(),
            kind: AccountType::Checking,
        })
    }

    fn at(day: u32) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("2024-01-{day:02}T00:00:00+00:00")).unwrap()
    }

    fn tx(id: &str, day: u32, minor: i64, payee: &str) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            id_origin: IdOrigin::Institution,
            account: account().id,
            date: at(day),
            amount: Amount::from_minor(minor),
            payee: payee.to_owned(),
            memo: None,
            kind: TransactionType::Other,
            check_number: None,
        }
    }

    fn synthesized(id: &str, day: u32, minor: i64, payee: &str) -> Transaction {
        Transaction {
            id_origin: IdOrigin::Synthesized,
            ..tx(id, day, minor, payee)
        }
    }

    fn statement(transactions: Vec<Transaction>, ledger: i64) -> Statement {
        Statement {
            account: account(),
            currency: "USD".to_owned(),
            start: at(1),
            end: at(3),
            ledger_balance: Amount::from_minor(ledger),
            available_balance: None,
            transactions,
            skipped: Vec::new(),
        }
    }

    fn scenario() -> Statement {
        statement(
            vec![
                tx("1", 1, -5_000, "Grocer"),
                tx("2", 2, 100_000, "Paycheck"),
                tx("3", 3, -2_500, "Fuel"),
            ],
            92_500,
        )
    }

    fn history_of(result: &MergeResult) -> Vec<Transaction> {
        result.history.iter().map(|entry| entry.transaction.clone()).collect()
    }

    #[test]
    fn import_into_empty_history() {
        let result = merge(&account(), &scenario(), &[]);
        assert_eq!(result.inserted.len(), 3);
        assert!(result.duplicates.is_empty());
        assert_eq!(result.balance, Amount::from_minor(92_500));
        assert_eq!(result.history[2].running_balance, Amount::from_minor(92_500));
        assert_eq!(result.discrepancy, None);
    }

    #[test]
    fn reimport_is_idempotent() {
        let first = merge(&account(), &scenario(), &[]);
        let history = history_of(&first);
        let second = merge(&account(), &scenario(), &history);
        assert_eq!(second.inserted.len(), 0);
        assert_eq!(second.duplicates.len(), first.inserted.len());
        assert!(second.duplicates.iter().all(|dup| dup.rule == MatchRule::Id));
        assert_eq!(second.history, first.history);
        assert_eq!(second.balance, first.balance);
        assert!(second.is_noop());
    }

    #[test]
    fn same_day_same_amount_different_payee_are_both_inserted() {
        let incoming = statement(
            vec![synthesized("a", 2, -1_000, "Cafe"), synthesized("b", 2, -1_000, "Bakery")],
            -2_000,
        );
        let result = merge(&account(), &incoming, &[]);
        assert_eq!(result.inserted.len(), 2);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn fallback_matches_exact_fields_when_id_is_missing() {
        let history = [tx("FIT-9", 2, -1_000, "Cafe")];
        let incoming = statement(vec![synthesized("syn-1", 2, -1_000, "Cafe")], -1_000);
        let result = merge(&account(), &incoming, &history);
        assert!(result.inserted.is_empty());
        assert_eq!(
            result.duplicates[0],
            Duplicate {
                incoming: synthesized("syn-1", 2, -1_000, "Cafe"),
                existing: TransactionId::from("FIT-9"),
                rule: MatchRule::Fields,
            }
        );
    }

    #[test]
    fn fallback_never_applies_between_stable_ids() {
        let history = [tx("FIT-9", 2, -1_000, "Cafe")];
        let incoming = statement(vec![tx("FIT-10", 2, -1_000, "Cafe")], -2_000);
        let result = merge(&account(), &incoming, &history);
        assert_eq!(result.inserted.len(), 1);
    }

    #[test]
    fn fallback_requires_statement_range() {
        let history = [tx("FIT-9", 5, -1_000, "Cafe")];
        let incoming = statement(vec![synthesized("syn-1", 5, -1_000, "Cafe")], 0);
        let result = merge(&account(), &incoming, &history);
        assert_eq!(result.inserted.len(), 1);
    }

    #[test]
    fn fallback_covers_records_later_on_the_end_day() {
        let noon = DateTime::parse_from_rfc3339("2024-01-03T12:00:00+00:00").unwrap();
        let history = [
            tx("FIT-1", 1, -2_500, "Grocer"),
            Transaction {
                date: noon,
                ..tx("FIT-3", 3, -2_500, "Fuel")
            },
        ];
        let incoming = statement(
            vec![Transaction {
                date: noon,
                ..synthesized("syn-3", 3, -2_500, "Fuel")
            }],
            -5_000,
        );
        let result = merge(&account(), &incoming, &history);
        assert!(result.inserted.is_empty());
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].existing, TransactionId::from("FIT-3"));
        assert_eq!(result.duplicates[0].rule, MatchRule::Fields);
        assert_eq!(result.discrepancy, None);
    }

    #[test]
    fn each_existing_transaction_absorbs_one_record() {
        let history = [synthesized("old", 2, -1_000, "Cafe")];
        let incoming = statement(
            vec![synthesized("new-1", 2, -1_000, "Cafe"), synthesized("new-2", 2, -1_000, "Cafe")],
            -2_000,
        );
        let result = merge(&account(), &incoming, &history);
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.inserted[0].id, TransactionId::from("new-2"));
        assert_eq!(result.discrepancy, None);
    }

    #[test]
    fn id_matches_take_priority_over_fallback() {
        let history = [synthesized("same", 2, -1_000, "Cafe")];
        let incoming = statement(
            vec![synthesized("other", 2, -1_000, "Cafe"), synthesized("same", 2, -1_000, "Cafe")],
            -2_000,
        );
        let result = merge(&account(), &incoming, &history);
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].rule, MatchRule::Id);
        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.inserted[0].id, TransactionId::from("other"));
    }

    #[test]
    fn repeated_id_within_statement_is_inserted_once() {
        let incoming = statement(vec![tx("1", 1, -100, "A"), tx("1", 1, -100, "A")], -100);
        let result = merge(&account(), &incoming, &[]);
        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.duplicates.len(), 1);
    }

    #[test]
    fn disabled_payee_matching_widens_rule() {
        let policy = DedupPolicy {
            match_payee: false,
            ..DedupPolicy::default()
        };
        let history = [tx("FIT-9", 2, -1_000, "CAFE #12")];
        let incoming = statement(vec![synthesized("syn", 2, -1_000, "Cafe")], -1_000);
        let result = Merger::new(policy).merge(&account(), &incoming, &history);
        assert!(result.inserted.is_empty());
    }

    #[test]
    fn inserted_transactions_belong_to_target_account() {
        let target = Account::manual(
            crate::models::AccountId::from("wallet"),
            "Wallet".to_owned(),
            AccountType::Cash,
            None,
        );
        let result = merge(&target, &scenario(), &[]);
        assert!(result.inserted.iter().all(|tx| tx.account == target.id));
    }

    #[test]
    fn discrepancy_is_reported_not_corrected() {
        let result = merge(&account(), &statement(scenario().transactions, 100_000), &[]);
        let discrepancy = result.discrepancy.unwrap();
        assert_eq!(discrepancy.computed, Amount::from_minor(92_500));
        assert_eq!(discrepancy.reported, Amount::from_minor(100_000));
        assert_eq!(result.balance, Amount::from_minor(92_500));
    }

    #[test]
    fn discrepancy_ignores_transactions_after_statement_end() {
        let history = [tx("later", 9, -700, "Rent")];
        let result = merge(&account(), &scenario(), &history);
        assert_eq!(result.discrepancy, None);
        assert_eq!(result.balance, Amount::from_minor(91_800));
    }

    #[test]
    fn recompute_is_order_consistent() {
        let base = scenario().transactions;
        let forward = recompute_balances(base.clone());
        let mut reversed = base;
        reversed.reverse();
        let backward = recompute_balances(reversed);
        assert_eq!(forward, backward);
        assert_eq!(closing_balance(&forward), Amount::from_minor(92_500));
    }

    #[test]
    fn recompute_breaks_ties_by_insertion_order() {
        let entries = recompute_balances(vec![tx("b", 2, 10, "B"), tx("a", 2, 20, "A"), tx("c", 1, 5, "C")]);
        let ids: Vec<&str> = entries.iter().map(|entry| entry.transaction.id.as_inner()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        let balances: Vec<i64> = entries.iter().map(|entry| entry.running_balance.minor()).collect();
        assert_eq!(balances, [5, 15, 35]);
    }

    #[test]
    fn daily_balances_carry_over_quiet_days() {
        let entries = recompute_balances(vec![tx("1", 1, -5_000, "A"), tx("2", 4, 1_000, "B")]);
        let daily = daily_balances(&entries, "2024-01-05".parse().unwrap());
        let values: Vec<i64> = daily.iter().map(|day| day.balance.minor()).collect();
        assert_eq!(values, [-5_000, -5_000, -5_000, -4_000, -4_000]);
        assert_eq!(daily[0].date, "2024-01-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn overflowing_running_balance_is_clamped() {
        let entries = recompute_balances(vec![
            tx("big", 1, i64::MAX, "Windfall"),
            tx("more", 2, 1, "Interest"),
            tx("back", 3, -10, "Fee"),
        ]);
        assert_eq!(entries[1].running_balance, Amount::from_minor(i64::MAX));
        assert_eq!(entries[2].running_balance, Amount::from_minor(i64::MAX - 10));
    }

    #[test]
    fn daily_balances_of_empty_history() {
        assert!(daily_balances(&[], "2024-01-05".parse().unwrap()).is_empty());
    }
}
