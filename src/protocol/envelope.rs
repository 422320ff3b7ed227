//! Top-level response envelope and message sets.

use super::{
    CreditCardStatementSyncResponse, CreditCardStatementTransactionResponse, SignupResponse,
    StatementSyncResponse, StatementTransactionResponse,
};
use crate::models::InstitutionId;

/// `STATUS` aggregate of a transaction wrapper.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Status {
    /// Status code; `0` means success.
    #[serde(rename = "CODE")]
    pub code: u32,
    /// Severity (`INFO`, `WARN`, `ERROR`).
    #[serde(rename = "SEVERITY", default)]
    pub severity: Option<String>,
    /// Human-readable message.
    #[serde(rename = "MESSAGE", default)]
    pub message: Option<String>,
}

impl Status {
    /// Returns `true` for the success code.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// `FI` aggregate identifying the institution.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FinancialInstitution {
    /// Organization name.
    #[serde(rename = "ORG", default)]
    pub organization: Option<String>,
    /// Institution identifier.
    #[serde(rename = "FID", default)]
    pub fid: Option<String>,
}

/// `SONRS`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SignonResponse {
    /// Signon status.
    #[serde(rename = "STATUS")]
    pub status: Status,
    /// Server date-time, including the institution's offset.
    #[serde(rename = "DTSERVER", default)]
    pub server_time: Option<String>,
    /// Response language.
    #[serde(rename = "LANGUAGE", default)]
    pub language: Option<String>,
    /// Institution identification.
    #[serde(rename = "FI", default)]
    pub institution: Option<FinancialInstitution>,
}

/// `SIGNONMSGSRSV1`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SignonMessageSet {
    /// The signon response.
    #[serde(rename = "SONRS")]
    pub response: SignonResponse,
}

tagged_union! {
    /// One response inside `BANKMSGSRSV1`.
    pub enum BankResponse, fallback Unsupported {
        /// `STMTTRNRS`: a single statement download.
        "STMTTRNRS" => Statement(StatementTransactionResponse),
        /// `STMTSYNCRS`: a batch of statement downloads.
        "STMTSYNCRS" => Sync(StatementSyncResponse),
    }
}

tagged_union! {
    /// One response inside `CREDITCARDMSGSRSV1`.
    pub enum CreditCardResponse, fallback Unsupported {
        /// `CCSTMTTRNRS`: a single statement download.
        "CCSTMTTRNRS" => Statement(CreditCardStatementTransactionResponse),
        /// `CCSTMTSYNCRS`: a batch of statement downloads.
        "CCSTMTSYNCRS" => Sync(CreditCardStatementSyncResponse),
    }
}

tagged_union! {
    /// A response message set.
    pub enum ResponseMessageSet, fallback Unsupported {
        /// `BANKMSGSRSV1`.
        "BANKMSGSRSV1" => Bank(Vec<BankResponse>),
        /// `CREDITCARDMSGSRSV1`.
        "CREDITCARDMSGSRSV1" => CreditCard(Vec<CreditCardResponse>),
        /// `SIGNUPMSGSRSV1`.
        "SIGNUPMSGSRSV1" => Signup(Vec<SignupResponse>),
    }
}

/// A parsed OFX response document.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct OfxResponse {
    /// Signon message set.
    #[serde(rename = "SIGNONMSGSRSV1", default)]
    pub signon: Option<SignonMessageSet>,
    /// All other message sets, in document order.
    #[serde(rename = "MSGSETS", default)]
    pub message_sets: Vec<ResponseMessageSet>,
}

impl OfxResponse {
    /// Parses a JSON rendering of an OFX response.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LedgerError::Serialization`] if the document
    /// does not match the message model.
    #[inline]
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the institution identifier declared in the signon response.
    #[inline]
    #[must_use]
    pub fn institution_id(&self) -> Option<InstitutionId> {
        self.signon
            .as_ref()
            .and_then(|signon| signon.response.institution.as_ref())
            .and_then(|fi| fi.fid.as_deref())
            .map(InstitutionId::from)
    }

    /// Returns the raw server date-time from the signon response.
    #[inline]
    #[must_use]
    pub fn server_time(&self) -> Option<&str> {
        self.signon
            .as_ref()
            .and_then(|signon| signon.response.server_time.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_deserializes() {
        let response = OfxResponse::from_json_str("{}").unwrap();
        assert!(response.signon.is_none());
        assert!(response.message_sets.is_empty());
        assert!(response.institution_id().is_none());
    }

    #[test]
    fn signon_exposes_institution_and_server_time() {
        let json = r#"{
            "SIGNONMSGSRSV1": {
                "SONRS": {
                    "STATUS": {"CODE": 0, "SEVERITY": "INFO"},
                    "DTSERVER": "20240105120000[-5:EST]",
                    "FI": {"ORG": "Example Bank", "FID": "10898"}
                }
            }
        }"#;
        let response = OfxResponse::from_json_str(json).unwrap();
        assert_eq!(response.institution_id(), Some(InstitutionId::from("10898")));
        assert_eq!(response.server_time(), Some("20240105120000[-5:EST]"));
    }

    #[test]
    fn unknown_message_set_is_preserved_by_name() {
        let json = r#"{"MSGSETS": [{"INVSTMTMSGSRSV1": [{"INVSTMTTRNRS": {}}]}]}"#;
        let response = OfxResponse::from_json_str(json).unwrap();
        assert_eq!(
            response.message_sets,
            vec![ResponseMessageSet::Unsupported {
                kind: "INVSTMTMSGSRSV1".to_owned()
            }]
        );
    }

    #[test]
    fn unknown_bank_response_is_preserved_by_name() {
        let json = r#"{"MSGSETS": [{"BANKMSGSRSV1": [{"STMTENDTRNRS": {"TRNUID": "1"}}]}]}"#;
        let response = OfxResponse::from_json_str(json).unwrap();
        let [ResponseMessageSet::Bank(responses)] = response.message_sets.as_slice() else {
            panic!("expected one bank message set");
        };
        assert_eq!(
            responses.as_slice(),
            [BankResponse::Unsupported {
                kind: "STMTENDTRNRS".to_owned()
            }]
        );
    }

    #[test]
    fn status_success_code() {
        let ok: Status = serde_json::from_str(r#"{"CODE": 0}"#).unwrap();
        let failed: Status = serde_json::from_str(r#"{"CODE": 2000, "MESSAGE": "x"}"#).unwrap();
        assert!(ok.is_success());
        assert!(!failed.is_success());
    }
}
