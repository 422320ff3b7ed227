//! Enumeration types for canonical account and transaction values.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

use super::Amount;

/// Canonical type of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountType {
    /// Checking/current account.
    Checking,
    /// Savings account.
    Savings,
    /// Money market account.
    MoneyMarket,
    /// Bank line of credit.
    CreditLine,
    /// Certificate of deposit.
    Certificate,
    /// Credit card.
    CreditCard,
    /// Loan account.
    Loan,
    /// Cash or other manually tracked account.
    Cash,
}

impl AccountType {
    /// All account types, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Checking,
        Self::Savings,
        Self::MoneyMarket,
        Self::CreditLine,
        Self::Certificate,
        Self::CreditCard,
        Self::Loan,
        Self::Cash,
    ];

    /// Returns the serialized tag of this type.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::MoneyMarket => "moneyMarket",
            Self::CreditLine => "creditLine",
            Self::Certificate => "certificate",
            Self::CreditCard => "creditCard",
            Self::Loan => "loan",
            Self::Cash => "cash",
        }
    }
}

impl core::fmt::Display for AccountType {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountType {
    type Err = LedgerError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::UnsupportedAccountVariant {
                variant: s.to_owned(),
            })
    }
}

/// Canonical type of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    /// Money leaving the account.
    Debit,
    /// Money entering the account.
    Credit,
    /// Cheque drawn on the account.
    Check,
    /// Transfer between accounts.
    Transfer,
    /// Fee or service charge.
    Fee,
    /// Interest or dividend earned.
    Interest,
    /// Anything else.
    Other,
}

impl TransactionType {
    /// Maps an OFX `TRNTYPE` value to the canonical set.
    ///
    /// Unknown values map to [`TransactionType::Other`].
    #[must_use]
    pub fn from_wire(trn_type: &str) -> Self {
        match trn_type.trim().to_ascii_uppercase().as_str() {
            "DEBIT" | "ATM" | "POS" | "PAYMENT" | "CASH" | "DIRECTDEBIT" | "REPEATPMT" => {
                Self::Debit
            }
            "CREDIT" | "DEP" | "DIRECTDEP" => Self::Credit,
            "CHECK" => Self::Check,
            "XFER" => Self::Transfer,
            "FEE" | "SRVCHG" => Self::Fee,
            "INT" | "DIV" => Self::Interest,
            _ => Self::Other,
        }
    }

    /// Returns `true` if `amount` has a sign this type allows.
    ///
    /// Debits and fees are never positive; credits and interest are never
    /// negative. Other types accept either sign.
    #[inline]
    #[must_use]
    pub const fn admits(self, amount: Amount) -> bool {
        match self {
            Self::Debit | Self::Fee => !amount.is_positive(),
            Self::Credit | Self::Interest => !amount.is_negative(),
            Self::Check | Self::Transfer | Self::Other => true,
        }
    }
}

/// Where a transaction identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdOrigin {
    /// Supplied by the institution and stable across downloads.
    Institution,
    /// Derived from the transaction's identifying fields.
    Synthesized,
}
