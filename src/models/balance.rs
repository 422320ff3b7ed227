//! Derived balance models.
//!
//! None of these are a source of truth: they are recomputed from the
//! transaction history whenever it changes.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, Transaction};

/// A transaction together with the running balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// The transaction.
    pub transaction: Transaction,
    /// Cumulative balance including this transaction.
    pub running_balance: Amount,
}

/// Closing balance of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    /// Calendar day.
    pub date: NaiveDate,
    /// Balance at the end of the day.
    pub balance: Amount,
}

/// Mismatch between the recomputed balance and the institution's figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDiscrepancy {
    /// End of the statement period the comparison was made at.
    pub as_of: DateTime<FixedOffset>,
    /// Running balance recomputed from history.
    pub computed: Amount,
    /// Ledger balance reported by the institution.
    pub reported: Amount,
}

impl BalanceDiscrepancy {
    /// Returns `reported - computed`.
    #[inline]
    #[must_use]
    pub fn difference(&self) -> Amount {
        self.reported - self.computed
    }
}

/// High, low and average of daily closing balances over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    /// First day of the period.
    pub since: NaiveDate,
    /// Number of days summarized.
    pub days: usize,
    /// Highest closing balance.
    pub high: Amount,
    /// Lowest closing balance.
    pub low: Amount,
    /// Mean closing balance, rounded half away from zero to minor units.
    pub average: Amount,
}

impl BalanceSummary {
    /// Summarizes the days of `daily` on or after `since`.
    ///
    /// Returns `None` if no day falls in the period.
    #[must_use]
    pub fn over(daily: &[DailyBalance], since: NaiveDate) -> Option<Self> {
        let period = || daily.iter().filter(|day| day.date >= since).map(|day| day.balance);
        let high = period().max()?;
        let low = period().min()?;
        let days = period().count();
        let total = period().try_fold(Decimal::ZERO, |total, balance| {
            total.checked_add(Decimal::from(balance.minor()))
        })?;
        let mean = total.checked_div(Decimal::from(days))?;
        Some(Self {
            since,
            days,
            high,
            low,
            average: Amount::from_decimal(mean, 0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, minor: i64) -> DailyBalance {
        DailyBalance {
            date: date.parse().unwrap(),
            balance: Amount::from_minor(minor),
        }
    }

    #[test]
    fn summary_over_period() {
        let daily = [
            day("2024-01-01", -5_000),
            day("2024-01-02", 95_000),
            day("2024-01-03", 92_500),
            day("2024-01-04", 92_500),
        ];
        let summary = BalanceSummary::over(&daily, "2024-01-02".parse().unwrap()).unwrap();
        assert_eq!(summary.days, 3);
        assert_eq!(summary.high, Amount::from_minor(95_000));
        assert_eq!(summary.low, Amount::from_minor(92_500));
        assert_eq!(summary.average, Amount::from_minor(93_333));
    }

    #[test]
    fn summary_average_rounds_half_away_from_zero() {
        let daily = [day("2024-01-01", -1), day("2024-01-02", -2)];
        let summary = BalanceSummary::over(&daily, "2024-01-01".parse().unwrap()).unwrap();
        assert_eq!(summary.average, Amount::from_minor(-2));
    }

    #[test]
    fn summary_of_empty_period_is_none() {
        let daily = [day("2024-01-01", 100)];
        assert_eq!(BalanceSummary::over(&daily, "2024-02-01".parse().unwrap()), None);
    }

    #[test]
    fn discrepancy_difference() {
        let discrepancy = BalanceDiscrepancy {
            as_of: DateTime::parse_from_rfc3339("2024-01-03T00:00:00Z").unwrap(),
            computed: Amount::from_minor(90_000),
            reported: Amount::from_minor(92_500),
        };
        assert_eq!(discrepancy.difference(), Amount::from_minor(2_500));
    }
}
