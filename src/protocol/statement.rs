//! Statement download aggregates for bank and credit-card message sets.

use super::{BankAccount, CreditCardAccount, Status};

/// `LEDGERBAL` / `AVAILBAL`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Balance {
    /// Balance amount, as wire text.
    #[serde(rename = "BALAMT")]
    pub amount: String,
    /// As-of date-time, as wire text.
    #[serde(rename = "DTASOF")]
    pub as_of: String,
}

/// `PAYEE` aggregate; only the name is read.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Payee {
    /// Payee name.
    #[serde(rename = "NAME")]
    pub name: String,
}

/// `STMTTRN`: one transaction record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct StatementTransaction {
    /// Transaction type, as wire text.
    #[serde(rename = "TRNTYPE")]
    pub trn_type: String,
    /// Posting date, as wire text.
    #[serde(rename = "DTPOSTED")]
    pub posted: String,
    /// Date the user initiated the transaction.
    #[serde(rename = "DTUSER", default)]
    pub user_date: Option<String>,
    /// Date the funds are available.
    #[serde(rename = "DTAVAIL", default)]
    pub available: Option<String>,
    /// Signed amount, as wire text.
    #[serde(rename = "TRNAMT")]
    pub amount: String,
    /// Institution transaction id.
    #[serde(rename = "FITID", default)]
    pub fit_id: Option<String>,
    /// Cheque number.
    #[serde(rename = "CHECKNUM", default)]
    pub check_number: Option<String>,
    /// Reference number.
    #[serde(rename = "REFNUM", default)]
    pub reference: Option<String>,
    /// Payee name.
    #[serde(rename = "NAME", default)]
    pub name: Option<String>,
    /// Extended payee aggregate, used when `NAME` is absent.
    #[serde(rename = "PAYEE", default)]
    pub payee: Option<Payee>,
    /// Memo.
    #[serde(rename = "MEMO", default)]
    pub memo: Option<String>,
}

impl StatementTransaction {
    /// Returns the payee text from `NAME` or, failing that, `PAYEE`.
    #[inline]
    #[must_use]
    pub fn payee_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.payee.as_ref().map(|payee| payee.name.as_str()))
            .unwrap_or_default()
    }

    /// Returns the institution id if it is present and non-blank.
    #[inline]
    #[must_use]
    pub fn stable_id(&self) -> Option<&str> {
        self.fit_id
            .as_deref()
            .map(str::trim)
            .filter(|fit_id| !fit_id.is_empty())
    }
}

/// `BANKTRANLIST`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct TransactionList {
    /// Start of the reported range, as wire text.
    #[serde(rename = "DTSTART")]
    pub start: String,
    /// End of the reported range, as wire text.
    #[serde(rename = "DTEND")]
    pub end: String,
    /// Transactions in institution order.
    #[serde(rename = "STMTTRN", default)]
    pub transactions: Vec<StatementTransaction>,
}

/// `STMTRS`: a bank statement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct StatementResponse {
    /// Default currency.
    #[serde(rename = "CURDEF")]
    pub currency: String,
    /// Statement account.
    #[serde(rename = "BANKACCTFROM")]
    pub account: BankAccount,
    /// Transactions, absent when none were requested.
    #[serde(rename = "BANKTRANLIST", default)]
    pub transaction_list: Option<TransactionList>,
    /// Ledger balance.
    #[serde(rename = "LEDGERBAL", default)]
    pub ledger_balance: Option<Balance>,
    /// Available balance.
    #[serde(rename = "AVAILBAL", default)]
    pub available_balance: Option<Balance>,
}

/// `CCSTMTRS`: a credit-card statement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreditCardStatementResponse {
    /// Default currency.
    #[serde(rename = "CURDEF")]
    pub currency: String,
    /// Statement account.
    #[serde(rename = "CCACCTFROM")]
    pub account: CreditCardAccount,
    /// Transactions, absent when none were requested.
    #[serde(rename = "BANKTRANLIST", default)]
    pub transaction_list: Option<TransactionList>,
    /// Ledger balance.
    #[serde(rename = "LEDGERBAL", default)]
    pub ledger_balance: Option<Balance>,
    /// Available balance.
    #[serde(rename = "AVAILBAL", default)]
    pub available_balance: Option<Balance>,
}

/// `STMTTRNRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct StatementTransactionResponse {
    /// Client transaction UID echoed back.
    #[serde(rename = "TRNUID", default)]
    pub trn_uid: Option<String>,
    /// Outcome of the request.
    #[serde(rename = "STATUS", default)]
    pub status: Option<Status>,
    /// The statement, absent on failure.
    #[serde(rename = "STMTRS", default)]
    pub statement: Option<StatementResponse>,
}

/// `CCSTMTTRNRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreditCardStatementTransactionResponse {
    /// Client transaction UID echoed back.
    #[serde(rename = "TRNUID", default)]
    pub trn_uid: Option<String>,
    /// Outcome of the request.
    #[serde(rename = "STATUS", default)]
    pub status: Option<Status>,
    /// The statement, absent on failure.
    #[serde(rename = "CCSTMTRS", default)]
    pub statement: Option<CreditCardStatementResponse>,
}

/// `STMTSYNCRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct StatementSyncResponse {
    /// Sync token for the next request.
    #[serde(rename = "TOKEN", default)]
    pub token: Option<String>,
    /// Whether the server lost track of the client's token (`Y`/`N`).
    #[serde(rename = "LOSTSYNC", default)]
    pub lost_sync: Option<String>,
    /// Statement responses in the batch.
    #[serde(rename = "STMTTRNRS", default)]
    pub responses: Vec<StatementTransactionResponse>,
}

/// `CCSTMTSYNCRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreditCardStatementSyncResponse {
    /// Sync token for the next request.
    #[serde(rename = "TOKEN", default)]
    pub token: Option<String>,
    /// Whether the server lost track of the client's token (`Y`/`N`).
    #[serde(rename = "LOSTSYNC", default)]
    pub lost_sync: Option<String>,
    /// Statement responses in the batch.
    #[serde(rename = "CCSTMTTRNRS", default)]
    pub responses: Vec<CreditCardStatementTransactionResponse>,
}
