//! Canonical transaction model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, IdOrigin, TransactionId, TransactionType};

/// A single posted transaction belonging to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Identifier, unique within the owning account.
    pub id: TransactionId,
    /// Whether `id` came from the institution or was synthesized.
    pub id_origin: IdOrigin,
    /// Owning account (relation only).
    pub account: AccountId,
    /// Posting instant.
    pub date: DateTime<FixedOffset>,
    /// Signed amount in minor units.
    pub amount: Amount,
    /// Payee or description text.
    pub payee: String,
    /// Free-text memo.
    pub memo: Option<String>,
    /// Transaction type.
    pub kind: TransactionType,
    /// Cheque number, when the institution reports one.
    pub check_number: Option<String>,
}

impl Transaction {
    /// Returns `true` if the identifier was supplied by the institution.
    #[inline]
    #[must_use]
    pub fn has_stable_id(&self) -> bool {
        self.id_origin == IdOrigin::Institution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            id: TransactionId::from("FIT-1"),
            id_origin: IdOrigin::Institution,
            account: AccountId::from("acc-1"),
            date: DateTime::parse_from_rfc3339("2024-01-15T12:00:00-05:00").unwrap(),
            amount: Amount::from_minor(-5_000),
            payee: "Coffee Shop".to_owned(),
            memo: Some("Morning coffee".to_owned()),
            kind: TransactionType::Debit,
            check_number: None,
        }
    }

    #[test]
    fn stable_id_follows_origin() {
        let mut tx = sample();
        assert!(tx.has_stable_id());
        tx.id_origin = IdOrigin::Synthesized;
        assert!(!tx.has_stable_id());
    }

    #[test]
    fn serialize_uses_camel_case_and_rfc3339() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["idOrigin"], "institution");
        assert_eq!(json["date"], "2024-01-15T12:00:00-05:00");
        assert_eq!(json["amount"], -5_000);
        assert_eq!(json["kind"], "debit");
    }

    #[test]
    fn serde_roundtrip() {
        let tx = sample();
        let json = serde_json::to_string(&tx).unwrap();
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, tx);
    }
}
