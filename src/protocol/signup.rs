//! Signup message set: account enumeration responses.

use super::{AccountInfo, Status};

/// `ACCTINFORS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AccountInfoResponse {
    /// Date the account list last changed.
    #[serde(rename = "DTACCTUP", default)]
    pub updated: Option<String>,
    /// Accounts available to the user.
    #[serde(rename = "ACCTINFO", default)]
    pub accounts: Vec<AccountInfo>,
}

/// `ACCTINFOTRNRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AccountInfoTransactionResponse {
    /// Client transaction UID echoed back.
    #[serde(rename = "TRNUID", default)]
    pub trn_uid: Option<String>,
    /// Outcome of the request.
    #[serde(rename = "STATUS", default)]
    pub status: Option<Status>,
    /// The account list, absent on failure.
    #[serde(rename = "ACCTINFORS", default)]
    pub response: Option<AccountInfoResponse>,
}

tagged_union! {
    /// One response inside `SIGNUPMSGSRSV1`.
    pub enum SignupResponse, fallback Unsupported {
        /// `ACCTINFOTRNRS`.
        "ACCTINFOTRNRS" => AccountInfo(AccountInfoTransactionResponse),
    }
}
