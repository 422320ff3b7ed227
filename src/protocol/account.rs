//! Account aggregates: `BANKACCTFROM`, `CCACCTFROM`, `LOANACCTFROM` and the
//! `ACCTINFO` variants that wrap them.

/// `BANKACCTFROM` / `BANKACCTTO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct BankAccount {
    /// Routing and transit number.
    #[serde(rename = "BANKID")]
    pub bank_id: String,
    /// Branch identifier.
    #[serde(rename = "BRANCHID", default)]
    pub branch_id: Option<String>,
    /// Account number.
    #[serde(rename = "ACCTID")]
    pub account_id: String,
    /// Account type (`CHECKING`, `SAVINGS`, `MONEYMRKT`, `CREDITLINE`, `CD`).
    #[serde(rename = "ACCTTYPE")]
    pub account_type: String,
    /// Checksum key.
    #[serde(rename = "ACCTKEY", default)]
    pub account_key: Option<String>,
}

/// `CCACCTFROM` / `CCACCTTO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreditCardAccount {
    /// Card account number.
    #[serde(rename = "ACCTID")]
    pub account_id: String,
    /// Checksum key.
    #[serde(rename = "ACCTKEY", default)]
    pub account_key: Option<String>,
}

/// `LOANACCTFROM` / `LOANACCTTO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct LoanAccount {
    /// Loan account number.
    #[serde(rename = "ACCTID")]
    pub account_id: String,
    /// Loan type (`AUTO`, `CONSUMER`, `MORTGAGE`, ...).
    #[serde(rename = "LOANACCTTYPE", default)]
    pub loan_type: Option<String>,
}

tagged_union! {
    /// The polymorphic "from-account" element.
    pub enum AccountFrom, fallback Unrecognized {
        /// `BANKACCTFROM`.
        "BANKACCTFROM" => Bank(BankAccount),
        /// `CCACCTFROM`.
        "CCACCTFROM" => CreditCard(CreditCardAccount),
        /// `LOANACCTFROM`.
        "LOANACCTFROM" => Loan(LoanAccount),
    }
}

/// `BANKACCTINFO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct BankAccountInfo {
    /// The account.
    #[serde(rename = "BANKACCTFROM")]
    pub account: BankAccount,
    /// Whether transaction detail downloads are supported (`Y`/`N`).
    #[serde(rename = "SUPTXDL", default)]
    pub supports_download: Option<String>,
    /// Service status (`AVAIL`, `PEND`, `ACTIVE`).
    #[serde(rename = "SVCSTATUS", default)]
    pub service_status: Option<String>,
}

/// `CCACCTINFO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CreditCardAccountInfo {
    /// The account.
    #[serde(rename = "CCACCTFROM")]
    pub account: CreditCardAccount,
    /// Whether transaction detail downloads are supported (`Y`/`N`).
    #[serde(rename = "SUPTXDL", default)]
    pub supports_download: Option<String>,
    /// Service status (`AVAIL`, `PEND`, `ACTIVE`).
    #[serde(rename = "SVCSTATUS", default)]
    pub service_status: Option<String>,
}

/// `LOANACCTINFO`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct LoanAccountInfo {
    /// The account.
    #[serde(rename = "LOANACCTFROM")]
    pub account: LoanAccount,
    /// Service status (`AVAIL`, `PEND`, `ACTIVE`).
    #[serde(rename = "SVCSTATUS", default)]
    pub service_status: Option<String>,
}

tagged_union! {
    /// The account-type specific part of `ACCTINFO`.
    pub enum AccountInfoDetails, fallback Unsupported {
        /// `BANKACCTINFO`.
        "BANKACCTINFO" => Bank(BankAccountInfo),
        /// `CCACCTINFO`.
        "CCACCTINFO" => CreditCard(CreditCardAccountInfo),
        /// `LOANACCTINFO`.
        "LOANACCTINFO" => Loan(LoanAccountInfo),
    }
}

impl AccountInfoDetails {
    /// Returns the wrapped account as a from-account element.
    #[inline]
    #[must_use]
    pub fn account_from(&self) -> AccountFrom {
        match self {
            Self::Bank(info) => AccountFrom::Bank(info.account.clone()),
            Self::CreditCard(info) => AccountFrom::CreditCard(info.account.clone()),
            Self::Loan(info) => AccountFrom::Loan(info.account.clone()),
            Self::Unsupported { kind } => AccountFrom::Unrecognized { kind: kind.clone() },
        }
    }
}

/// `ACCTINFO`: one account available to the signed-on user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AccountInfo {
    /// Account description chosen by the institution or user.
    #[serde(rename = "DESC", default)]
    pub description: Option<String>,
    /// Telephone number for the account.
    #[serde(rename = "PHONE", default)]
    pub phone: Option<String>,
    /// Account-type specific details.
    #[serde(flatten)]
    pub details: AccountInfoDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_from_dispatches_on_element_name() {
        let json = r#"{"CCACCTFROM": {"ACCTID": "4111111111111111"}}"#;
        let account: AccountFrom = serde_json::from_str(json).unwrap();
        assert_eq!(
            account,
            AccountFrom::CreditCard(CreditCardAccount {
                account_id: "4111111111111111".to_owned(),
                account_key: None,
            })
        );
    }

    #[test]
    fn account_from_unknown_element_is_kept() {
        let json = r#"{"INVACCTFROM": {"BROKERID": "b.com", "ACCTID": "9"}}"#;
        let account: AccountFrom = serde_json::from_str(json).unwrap();
        assert_eq!(
            account,
            AccountFrom::Unrecognized {
                kind: "INVACCTFROM".to_owned()
            }
        );
    }

    #[test]
    fn account_info_flattens_variant() {
        let json = r#"{
            "DESC": "Joint checking",
            "BANKACCTINFO": {
                "BANKACCTFROM": {"BANKID": "121000248", "ACCTID": "1234", "ACCTTYPE": "CHECKING"},
                "SUPTXDL": "Y",
                "SVCSTATUS": "ACTIVE"
            }
        }"#;
        let info: AccountInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.description.as_deref(), Some("Joint checking"));
        let AccountFrom::Bank(bank) = info.details.account_from() else {
            panic!("expected bank account");
        };
        assert_eq!(bank.bank_id, "121000248");
        assert_eq!(bank.account_type, "CHECKING");
    }

    #[test]
    fn account_info_without_details_is_unsupported() {
        let json = r#"{"DESC": "Brokerage", "INVACCTINFO": {}}"#;
        let info: AccountInfo = serde_json::from_str(json).unwrap();
        assert_eq!(
            info.details,
            AccountInfoDetails::Unsupported {
                kind: "INVACCTINFO".to_owned()
            }
        );
    }
}
