//! Maps OFX `STMTTRN` records to canonical transactions.

use chrono::{DateTime, FixedOffset};
use sha2::{Digest as _, Sha256};

use crate::codec::Codec;
use crate::error::Result;
use crate::models::{
    Account, Amount, IdOrigin, SkippedTransaction, Transaction, TransactionId, TransactionType,
};
use crate::protocol::StatementTransaction;

/// Normalizes one transaction record for `account`.
///
/// `ordinal` is the record's position in its source list; it only feeds the
/// synthesized id of records without a `FITID`, so that importing the same
/// file twice yields the same ids.
///
/// When the wire type implies a sign the amount contradicts, the amount is
/// kept and the type becomes [`TransactionType::Other`].
///
/// # Errors
///
/// Returns [`crate::error::LedgerError::MalformedAmount`] or
/// [`crate::error::LedgerError::MalformedDate`] if `TRNAMT` or `DTPOSTED`
/// cannot be decoded.
#[inline]
pub fn normalize(
    record: &StatementTransaction,
    ordinal: usize,
    account: &Account,
    codec: &Codec,
) -> Result<Transaction> {
    let date = codec.instant(&record.posted)?;
    let amount = codec.amount(&record.amount)?;
    let payee = record.payee_name().trim().to_owned();

    let mut kind = TransactionType::from_wire(&record.trn_type);
    if !kind.admits(amount) {
        tracing::warn!(
            account = %account.id,
            fit_id = record.stable_id().unwrap_or_default(),
            trn_type = %record.trn_type,
            amount = %amount,
            "amount sign contradicts transaction type, recording as other"
        );
        kind = TransactionType::Other;
    }

    let (id, id_origin) = match record.stable_id() {
        Some(fit_id) => (TransactionId::from(fit_id), IdOrigin::Institution),
        None => (
            synthesize_id(&account_identity(account), &date, amount, &payee, ordinal),
            IdOrigin::Synthesized,
        ),
    };

    Ok(Transaction {
        id,
        id_origin,
        account: account.id.clone(),
        date,
        amount,
        payee,
        memo: non_blank(record.memo.as_deref()),
        kind,
        check_number: non_blank(record.check_number.as_deref()),
    })
}

/// Normalizes a whole transaction list, keeping every failure as a
/// [`SkippedTransaction`].
#[must_use]
pub fn normalize_all(
    records: &[StatementTransaction],
    account: &Account,
    codec: &Codec,
) -> (Vec<Transaction>, Vec<SkippedTransaction>) {
    let mut transactions = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for (ordinal, record) in records.iter().enumerate() {
        match normalize(record, ordinal, account, codec) {
            Ok(transaction) => transactions.push(transaction),
            Err(err) => {
                tracing::warn!(
                    account = %account.id,
                    ordinal,
                    error = %err,
                    "skipping transaction record"
                );
                skipped.push(SkippedTransaction {
                    ordinal,
                    fit_id: record.stable_id().map(str::to_owned),
                    reason: err.to_string(),
                });
            }
        }
    }
    (transactions, skipped)
}

/// Derives a deterministic transaction id from its identifying fields.
///
/// The id is the hex SHA-256 of the fields joined by a unit separator.
#[must_use]
pub fn synthesize_id(
    account: &str,
    date: &DateTime<FixedOffset>,
    amount: Amount,
    payee: &str,
    ordinal: usize,
) -> TransactionId {
    let date_text = date.to_rfc3339();
    let amount_text = amount.minor().to_string();
    let ordinal_text = ordinal.to_string();

    let mut hasher = Sha256::new();
    for part in [
        account,
        date_text.as_str(),
        amount_text.as_str(),
        payee,
        ordinal_text.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    TransactionId::new(hex::encode(hasher.finalize()))
}

/// Stable identity text of an account: its canonical key, or its id for
/// manual accounts.
#[must_use]
pub fn account_identity(account: &Account) -> String {
    account
        .key
        .as_ref()
        .map_or_else(|| account.id.to_string(), ToString::to_string)
}

/// Trims `value` and drops it if nothing is left.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
