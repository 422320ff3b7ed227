//! Collapses the polymorphic OFX account elements into canonical accounts.
//!
//! Bank accounts are keyed by their routing number (`BANKID`). Credit-card
//! and loan accounts carry no routing number, so they are keyed by the
//! institution `FID` from the signon response when one is present.

use crate::error::{LedgerError, Result};
use crate::models::{Account, AccountKey, AccountType, InstitutionId};
use crate::protocol::{
    AccountFrom, AccountInfo, BankAccount, CreditCardAccount, LoanAccount, OfxResponse,
    ResponseMessageSet, SignupResponse,
};

/// Resolves an account element into its canonical key.
///
/// `institution` is the signon `FID`; it is ignored for bank accounts.
///
/// # Errors
///
/// Returns [`LedgerError::UnsupportedAccountVariant`] for unrecognized
/// elements and for bank account types outside the known set.
#[inline]
pub fn resolve_key(account: &AccountFrom, institution: Option<&InstitutionId>) -> Result<AccountKey> {
    match account {
        AccountFrom::Bank(bank) => bank_key(bank),
        AccountFrom::CreditCard(card) => Ok(credit_card_key(card, institution)),
        AccountFrom::Loan(loan) => Ok(loan_key(loan, institution)),
        AccountFrom::Unrecognized { kind } => Err(LedgerError::UnsupportedAccountVariant {
            variant: kind.clone(),
        }),
    }
}

/// Resolves an account element into a canonical account.
///
/// # Errors
///
/// See [`resolve_key`].
#[inline]
pub fn resolve(account: &AccountFrom, institution: Option<&InstitutionId>) -> Result<Account> {
    resolve_key(account, institution).map(Account::resolved)
}

/// Canonical key of a `BANKACCTFROM`.
///
/// # Errors
///
/// Returns [`LedgerError::UnsupportedAccountVariant`] if `ACCTTYPE` is unknown.
#[inline]
pub fn bank_key(bank: &BankAccount) -> Result<AccountKey> {
    Ok(AccountKey {
        institution: Some(InstitutionId::new(bank.bank_id.trim().to_owned())),
        number: bank.account_id.trim().to_owned(),
        kind: bank_account_type(&bank.account_type)?,
    })
}

/// Canonical key of a `CCACCTFROM`.
#[inline]
#[must_use]
pub fn credit_card_key(card: &CreditCardAccount, institution: Option<&InstitutionId>) -> AccountKey {
    AccountKey {
        institution: institution.cloned(),
        number: card.account_id.trim().to_owned(),
        kind: AccountType::CreditCard,
    }
}

/// Canonical key of a `LOANACCTFROM`.
#[inline]
#[must_use]
pub fn loan_key(loan: &LoanAccount, institution: Option<&InstitutionId>) -> AccountKey {
    AccountKey {
        institution: institution.cloned(),
        number: loan.account_id.trim().to_owned(),
        kind: AccountType::Loan,
    }
}

/// Maps an OFX bank `ACCTTYPE` to the canonical account type.
///
/// # Errors
///
/// Returns [`LedgerError::UnsupportedAccountVariant`] for unknown tags.
#[inline]
pub fn bank_account_type(tag: &str) -> Result<AccountType> {
    match tag.trim().to_ascii_uppercase().as_str() {
        "CHECKING" => Ok(AccountType::Checking),
        "SAVINGS" => Ok(AccountType::Savings),
        "MONEYMRKT" => Ok(AccountType::MoneyMarket),
        "CREDITLINE" => Ok(AccountType::CreditLine),
        "CD" => Ok(AccountType::Certificate),
        _ => Err(LedgerError::UnsupportedAccountVariant {
            variant: format!("ACCTTYPE {tag}"),
        }),
    }
}

/// Resolves every `ACCTINFO` entry of the signup message sets in `response`.
///
/// The institution's description, when present, becomes the display name.
/// Failed responses and unsupported account variants are skipped with a
/// warning.
#[must_use]
pub fn enumerate_accounts(response: &OfxResponse) -> Vec<Account> {
    let institution = response.institution_id();
    let mut accounts = Vec::new();

    for message_set in &response.message_sets {
        let ResponseMessageSet::Signup(responses) = message_set else {
            continue;
        };
        for signup in responses {
            let info_response = match signup {
                SignupResponse::AccountInfo(info_response) => info_response,
                SignupResponse::Unsupported { kind } => {
                    tracing::warn!(kind = %kind, "skipping unsupported signup response");
                    continue;
                }
            };
            if let Some(status) = info_response.status.as_ref().filter(|status| !status.is_success()) {
                tracing::warn!(
                    code = status.code,
                    message = status.message.as_deref().unwrap_or_default(),
                    "skipping failed account info response"
                );
                continue;
            }
            let Some(list) = info_response.response.as_ref() else {
                continue;
            };
            for info in &list.accounts {
                match resolve_info(info, institution.as_ref()) {
                    Ok(account) => push_unique(&mut accounts, account),
                    Err(err) => tracing::warn!(error = %err, "skipping account info entry"),
                }
            }
        }
    }

    accounts
}

/// Resolves one `ACCTINFO` entry, naming the account after its description.
fn resolve_info(info: &AccountInfo, institution: Option<&InstitutionId>) -> Result<Account> {
    let mut account = resolve(&info.details.account_from(), institution)?;
    if let Some(description) = info
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
    {
        description.clone_into(&mut account.name);
    }
    Ok(account)
}

/// Appends `account` unless the same entity is already present.
fn push_unique(accounts: &mut Vec<Account>, account: Account) {
    if !accounts.iter().any(|existing| existing.same_entity(&account)) {
        accounts.push(account);
    }
}
