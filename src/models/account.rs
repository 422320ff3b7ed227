//! Canonical account model.

use serde::{Deserialize, Serialize};

use super::{AccountId, AccountType, Amount, CredentialId, InstitutionId};

/// Institution-agnostic identity of an account.
///
/// Two keys are equal iff institution, account number and type all match,
/// regardless of which protocol element they were resolved from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    /// Institution identifier (routing number for bank accounts, `FID`
    /// otherwise). Absent when the response does not name an institution.
    pub institution: Option<InstitutionId>,
    /// Account number as reported by the institution.
    pub number: String,
    /// Account type tag.
    pub kind: AccountType,
}

impl AccountKey {
    /// Derives the internal account identifier for this key.
    #[inline]
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        AccountId::new(self.to_string())
    }
}

impl core::fmt::Display for AccountKey {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let institution = self.institution.as_ref().map_or("-", InstitutionId::as_inner);
        write!(f, "{institution}/{}/{}", self.number, self.kind)
    }
}

/// An account whose transaction history is tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Internal identifier.
    pub id: AccountId,
    /// Canonical institution identity; absent for manual accounts.
    pub key: Option<AccountKey>,
    /// Account type.
    pub kind: AccountType,
    /// Display name.
    pub name: String,
    /// ISO 4217 currency code.
    pub currency: Option<String>,
    /// Link to the institution user credential; absent for manual accounts.
    pub credential: Option<CredentialId>,
    /// Cached balance after the latest merge or edit.
    #[serde(default)]
    pub balance: Amount,
}

impl Account {
    /// Creates the canonical form of an account resolved from protocol data.
    #[inline]
    #[must_use]
    pub fn resolved(key: AccountKey) -> Self {
        Self {
            id: key.account_id(),
            kind: key.kind,
            name: key.number.clone(),
            key: Some(key),
            currency: None,
            credential: None,
            balance: Amount::ZERO,
        }
    }

    /// Creates a manually maintained account.
    #[inline]
    #[must_use]
    pub const fn manual(
        id: AccountId,
        name: String,
        kind: AccountType,
        currency: Option<String>,
    ) -> Self {
        Self {
            id,
            key: None,
            kind,
            name,
            currency,
            credential: None,
            balance: Amount::ZERO,
        }
    }

    /// Returns `true` if no institution credential is linked.
    #[inline]
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        self.credential.is_none()
    }

    /// Returns `true` if both values denote the same account entity.
    ///
    /// Accounts with a canonical key compare by key; accounts without one
    /// compare by internal identifier.
    #[inline]
    #[must_use]
    pub fn same_entity(&self, other: &Self) -> bool {
        match (self.key.as_ref(), other.key.as_ref()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            (None, None) => self.id == other.id,
            (Some(_), None) | (None, Some(_)) => false,
        }
    }
}
