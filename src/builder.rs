//! Assembles canonical statements from an OFX response envelope.
//!
//! [`build_statements`] walks every message set of a response and yields one
//! [`Statement`] per bank or credit-card statement response, including those
//! nested in sync batches. A response that cannot be turned into a statement
//! is logged and recorded as a [`SkippedResponse`]; it never aborts the walk.

use crate::codec::Codec;
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::models::{Account, AccountKey, InstitutionId, SkippedResponse, Statement};
use crate::normalizer::normalize_all;
use crate::protocol::{
    Balance, BankResponse, CreditCardResponse, CreditCardStatementTransactionResponse,
    OfxResponse, ResponseMessageSet, StatementTransaction, StatementTransactionResponse, Status,
    TransactionList,
};
use crate::resolver;

/// Returns a lazy sequence of the statements contained in `response`.
///
/// Statements are built one at a time as the sequence is advanced. The
/// sequence is finite and can be restarted by cloning it before iteration
/// or by calling this function again.
#[inline]
#[must_use]
pub fn build_statements<'a>(response: &'a OfxResponse, config: &Config) -> Statements<'a> {
    Statements {
        sources: flatten(response),
        position: 0,
        codec: Codec::for_response(config, response),
        institution: response.institution_id(),
        skipped: Vec::new(),
    }
}

/// A statement-shaped response located in the envelope.
#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    /// `STMTTRNRS`.
    Bank(&'a StatementTransactionResponse),
    /// `CCSTMTTRNRS`.
    CreditCard(&'a CreditCardStatementTransactionResponse),
    /// Anything the builder does not handle.
    Unsupported(&'a str),
}

/// Lazy, restartable sequence of statements built from one response.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    /// Responses in document order.
    sources: Vec<Source<'a>>,
    /// Next source to build.
    position: usize,
    /// Codec settings for this response.
    codec: Codec,
    /// Institution `FID` from the signon response.
    institution: Option<InstitutionId>,
    /// Responses skipped so far.
    skipped: Vec<SkippedResponse>,
}

impl Statements<'_> {
    /// Returns the responses skipped so far.
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> &[SkippedResponse] {
        &self.skipped
    }

    /// Builds every remaining statement and returns them with all skipped
    /// responses.
    #[inline]
    #[must_use]
    pub fn into_parts(mut self) -> (Vec<Statement>, Vec<SkippedResponse>) {
        let statements = self.by_ref().collect();
        (statements, self.skipped)
    }

    /// Builds a bank statement from `STMTTRNRS`.
    fn build_bank(&self, wrapper: &StatementTransactionResponse) -> Result<Statement> {
        check_status(wrapper.status.as_ref())?;
        let rs = wrapper
            .statement
            .as_ref()
            .ok_or(LedgerError::MissingElement { element: "STMTRS" })?;
        self.assemble(
            resolver::bank_key(&rs.account)?,
            &rs.currency,
            rs.transaction_list.as_ref(),
            rs.ledger_balance.as_ref(),
            rs.available_balance.as_ref(),
        )
    }

    /// Builds a credit-card statement from `CCSTMTTRNRS`.
    fn build_credit_card(&self, wrapper: &CreditCardStatementTransactionResponse) -> Result<Statement> {
        check_status(wrapper.status.as_ref())?;
        let rs = wrapper
            .statement
            .as_ref()
            .ok_or(LedgerError::MissingElement { element: "CCSTMTRS" })?;
        self.assemble(
            resolver::credit_card_key(&rs.account, self.institution.as_ref()),
            &rs.currency,
            rs.transaction_list.as_ref(),
            rs.ledger_balance.as_ref(),
            rs.available_balance.as_ref(),
        )
    }

    /// Shared statement assembly for both statement kinds.
    fn assemble(
        &self,
        key: AccountKey,
        wire_currency: &str,
        list: Option<&TransactionList>,
        ledger_element: Option<&Balance>,
        available: Option<&Balance>,
    ) -> Result<Statement> {
        let currency = wire_currency.trim().to_ascii_uppercase();
        let mut account = Account::resolved(key);
        account.currency = Some(currency.clone());

        let ledger = ledger_element.ok_or(LedgerError::MissingElement { element: "LEDGERBAL" })?;
        let ledger_balance = self.codec.amount(&ledger.amount)?;
        let available_balance = available.and_then(|balance| match self.codec.amount(&balance.amount) {
            Ok(amount) => Some(amount),
            Err(err) => {
                tracing::warn!(account = %account.id, error = %err, "ignoring malformed AVAILBAL");
                None
            }
        });

        let (start, end, records): (_, _, &[StatementTransaction]) = match list {
            Some(list) => (
                self.codec.instant(&list.start)?,
                self.codec.instant(&list.end)?,
                list.transactions.as_slice(),
            ),
            None => {
                let as_of = self.codec.instant(&ledger.as_of)?;
                (as_of, as_of, &[])
            }
        };
        if start > end {
            return Err(LedgerError::InvertedDateRange);
        }

        let (transactions, skipped) = normalize_all(records, &account, &self.codec);
        let statement = Statement {
            account,
            currency,
            start,
            end,
            ledger_balance,
            available_balance,
            transactions,
            skipped,
        };
        for transaction in statement
            .transactions
            .iter()
            .filter(|transaction| !statement.covers(&transaction.date))
        {
            tracing::warn!(
                account = %statement.account.id,
                transaction = %transaction.id,
                date = %transaction.date,
                "transaction dated outside the statement range"
            );
        }
        tracing::debug!(
            account = %statement.account.id,
            transactions = statement.transactions.len(),
            skipped = statement.skipped.len(),
            "built statement"
        );
        Ok(statement)
    }
}

impl Iterator for Statements<'_> {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        while let Some(&source) = self.sources.get(self.position) {
            self.position += 1;
            let (kind, outcome) = match source {
                Source::Bank(wrapper) => ("STMTTRNRS", self.build_bank(wrapper)),
                Source::CreditCard(wrapper) => ("CCSTMTTRNRS", self.build_credit_card(wrapper)),
                Source::Unsupported(kind) => {
                    tracing::warn!(kind = %kind, "skipping unsupported response kind");
                    self.skipped.push(SkippedResponse {
                        kind: kind.to_owned(),
                        reason: "unsupported response kind".to_owned(),
                    });
                    continue;
                }
            };
            match outcome {
                Ok(statement) => return Some(statement),
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "skipping statement response");
                    self.skipped.push(SkippedResponse {
                        kind: kind.to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        None
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.sources.len().saturating_sub(self.position)))
    }
}

/// Fails with [`LedgerError::FailedResponse`] for a non-success status.
fn check_status(status: Option<&Status>) -> Result<()> {
    match status {
        Some(status) if !status.is_success() => Err(LedgerError::FailedResponse {
            code: status.code,
            message: status.message.clone().unwrap_or_default(),
        }),
        Some(_) | None => Ok(()),
    }
}

/// Lists every statement-shaped response of `response` in document order.
fn flatten(response: &OfxResponse) -> Vec<Source<'_>> {
    let mut sources = Vec::new();
    for message_set in &response.message_sets {
        match message_set {
            ResponseMessageSet::Bank(responses) => {
                for bank in responses {
                    match bank {
                        BankResponse::Statement(wrapper) => sources.push(Source::Bank(wrapper)),
                        BankResponse::Sync(sync) => {
                            sources.extend(sync.responses.iter().map(Source::Bank));
                        }
                        BankResponse::Unsupported { kind } => {
                            sources.push(Source::Unsupported(kind));
                        }
                    }
                }
            }
            ResponseMessageSet::CreditCard(responses) => {
                for card in responses {
                    match card {
                        CreditCardResponse::Statement(wrapper) => {
                            sources.push(Source::CreditCard(wrapper));
                        }
                        CreditCardResponse::Sync(sync) => {
                            sources.extend(sync.responses.iter().map(Source::CreditCard));
                        }
                        CreditCardResponse::Unsupported { kind } => {
                            sources.push(Source::Unsupported(kind));
                        }
                    }
                }
            }
            ResponseMessageSet::Signup(_) => {
                tracing::debug!("signup message set carries no statements");
            }
            ResponseMessageSet::Unsupported { kind } => sources.push(Source::Unsupported(kind)),
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Amount};

    const CHECKING: &str = r#"{"BANKID": "121000248", "ACCTID": "1234", "ACCTTYPE": "CHECKING"}"#;

    fn statement_rs(account: &str, list: &str, ledger: &str) -> String {
        format!(
            r#"{{"TRNUID": "1", "STATUS": {{"CODE": 0}}, "STMTRS": {{
                "CURDEF": "usd", "BANKACCTFROM": {account}, {list} {ledger}
            }}}}"#
        )
    }

    fn scenario_list() -> &'static str {
        r#""BANKTRANLIST": {"DTSTART": "20240101", "DTEND": "20240103", "STMTTRN": [
            {"TRNTYPE": "DEBIT", "DTPOSTED": "20240101", "TRNAMT": "-50.00", "FITID": "1", "NAME": "Grocer"},
            {"TRNTYPE": "DEP", "DTPOSTED": "20240102", "TRNAMT": "1000.00", "FITID": "2", "NAME": "Paycheck"},
            {"TRNTYPE": "DEBIT", "DTPOSTED": "20240103", "TRNAMT": "-25.00", "FITID": "3", "NAME": "Fuel"}
        ]},"#
    }

    fn ledger(amount: &str) -> String {
        format!(r#""LEDGERBAL": {{"BALAMT": "{amount}", "DTASOF": "20240103"}}"#)
    }

    fn bank_document(responses: &[String]) -> OfxResponse {
        let json = format!(r#"{{"MSGSETS": [{{"BANKMSGSRSV1": [{}]}}]}}"#, responses.join(","));
        OfxResponse::from_json_str(&json).unwrap()
    }

    fn single(rs: String) -> String {
        format!(r#"{{"STMTTRNRS": {rs}}}"#)
    }

    #[test]
    fn builds_bank_statement() {
        let response = bank_document(&[single(statement_rs(CHECKING, scenario_list(), &ledger("925.00")))]);
        let (statements, skipped) = build_statements(&response, &Config::default()).into_parts();
        assert!(skipped.is_empty());
        let [statement] = statements.as_slice() else {
            panic!("expected one statement");
        };
        assert_eq!(statement.currency, "USD");
        assert_eq!(statement.account.currency.as_deref(), Some("USD"));
        assert_eq!(statement.account.kind, AccountType::Checking);
        assert_eq!(statement.ledger_balance, Amount::from_minor(92_500));
        assert_eq!(statement.transactions.len(), 3);
        assert_eq!(statement.transactions[1].payee, "Paycheck");
        assert!(statement.start <= statement.end);
        assert!(statement.transactions.iter().all(|tx| tx.account == statement.account.id));
    }

    #[test]
    fn sync_batch_with_unsupported_kind_yields_partial_result() {
        let sync = format!(
            r#"{{"STMTSYNCRS": {{"TOKEN": "9", "STMTTRNRS": [{}]}}}}"#,
            statement_rs(CHECKING, scenario_list(), &ledger("925.00"))
        );
        let response = bank_document(&[sync, r#"{"STMTENDTRNRS": {"TRNUID": "2"}}"#.to_owned()]);
        let mut statements = build_statements(&response, &Config::default());
        assert_eq!(statements.by_ref().count(), 1);
        assert_eq!(
            statements.skipped(),
            [SkippedResponse {
                kind: "STMTENDTRNRS".to_owned(),
                reason: "unsupported response kind".to_owned(),
            }]
        );
    }

    #[test]
    fn failing_response_does_not_abort_siblings() {
        let failed = single(r#"{"TRNUID": "1", "STATUS": {"CODE": 2000, "MESSAGE": "General error"}}"#.to_owned());
        let bad_type = single(statement_rs(
            r#"{"BANKID": "1", "ACCTID": "9", "ACCTTYPE": "BROKERAGE"}"#,
            "",
            &ledger("0"),
        ));
        let no_ledger = single(format!(
            r#"{{"STMTRS": {{"CURDEF": "USD", "BANKACCTFROM": {CHECKING}}}}}"#
        ));
        let good = single(statement_rs(CHECKING, scenario_list(), &ledger("925.00")));
        let response = bank_document(&[failed, bad_type, no_ledger, good]);

        let (statements, skipped) = build_statements(&response, &Config::default()).into_parts();
        assert_eq!(statements.len(), 1);
        let reasons: Vec<&str> = skipped.iter().map(|skip| skip.reason.as_str()).collect();
        assert_eq!(skipped.len(), 3);
        assert!(reasons[0].contains("2000"));
        assert!(reasons[1].contains("unsupported account variant"));
        assert!(reasons[2].contains("LEDGERBAL"));
        assert!(skipped.iter().all(|skip| skip.kind == "STMTTRNRS"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let list = r#""BANKTRANLIST": {"DTSTART": "20240105", "DTEND": "20240101", "STMTTRN": []},"#;
        let response = bank_document(&[single(statement_rs(CHECKING, list, &ledger("0")))]);
        let (statements, skipped) = build_statements(&response, &Config::default()).into_parts();
        assert!(statements.is_empty());
        assert_eq!(skipped[0].reason, LedgerError::InvertedDateRange.to_string());
    }

    #[test]
    fn missing_transaction_list_uses_balance_date() {
        let response = bank_document(&[single(statement_rs(CHECKING, "", &ledger("10.00")))]);
        let statement = build_statements(&response, &Config::default()).next().unwrap();
        assert!(statement.transactions.is_empty());
        assert_eq!(statement.start, statement.end);
        assert_eq!(statement.end.to_rfc3339(), "2024-01-03T00:00:00+00:00");
    }

    #[test]
    fn malformed_record_is_skipped_inside_statement() {
        let list = r#""BANKTRANLIST": {"DTSTART": "20240101", "DTEND": "20240103", "STMTTRN": [
            {"TRNTYPE": "DEBIT", "DTPOSTED": "20240101", "TRNAMT": "-5..0", "FITID": "bad"},
            {"TRNTYPE": "DEBIT", "DTPOSTED": "20240102", "TRNAMT": "-5.00", "FITID": "ok"},
            {"TRNTYPE": "DEBIT", "DTPOSTED": "20240201", "TRNAMT": "-1.00", "FITID": "late"}
        ]},"#;
        let response = bank_document(&[single(statement_rs(CHECKING, list, &ledger("-6.00")))]);
        let statement = build_statements(&response, &Config::default()).next().unwrap();
        assert_eq!(statement.transactions.len(), 2);
        assert_eq!(statement.skipped.len(), 1);
        assert_eq!(statement.skipped[0].fit_id.as_deref(), Some("bad"));
        assert!(!statement.covers(&statement.transactions[1].date));
    }

    #[test]
    fn credit_card_statement_uses_signon_fid() {
        let json = r#"{
            "SIGNONMSGSRSV1": {"SONRS": {"STATUS": {"CODE": 0}, "DTSERVER": "20240105[-5:EST]", "FI": {"FID": "7101"}}},
            "MSGSETS": [{"CREDITCARDMSGSRSV1": [{"CCSTMTTRNRS": {"STATUS": {"CODE": 0}, "CCSTMTRS": {
                "CURDEF": "USD",
                "CCACCTFROM": {"ACCTID": "4111"},
                "BANKTRANLIST": {"DTSTART": "20240101", "DTEND": "20240105", "STMTTRN": [
                    {"TRNTYPE": "DEBIT", "DTPOSTED": "20240102", "TRNAMT": "-12.34", "FITID": "c1"}
                ]},
                "LEDGERBAL": {"BALAMT": "-12.34", "DTASOF": "20240105"},
                "AVAILBAL": {"BALAMT": "987.66", "DTASOF": "20240105"}
            }}}]}]
        }"#;
        let response = OfxResponse::from_json_str(json).unwrap();
        let statement = build_statements(&response, &Config::default()).next().unwrap();
        let key = statement.account.key.clone().unwrap();
        assert_eq!(key.kind, AccountType::CreditCard);
        assert_eq!(key.institution, Some(InstitutionId::from("7101")));
        assert_eq!(statement.available_balance, Some(Amount::from_minor(98_766)));
        assert_eq!(statement.start.to_rfc3339(), "2024-01-01T00:00:00-05:00");
    }

    #[test]
    fn unsupported_message_set_is_skipped() {
        let json = r#"{"MSGSETS": [{"INVSTMTMSGSRSV1": []}, {"SIGNUPMSGSRSV1": []}]}"#;
        let response = OfxResponse::from_json_str(json).unwrap();
        let (statements, skipped) = build_statements(&response, &Config::default()).into_parts();
        assert!(statements.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].kind, "INVSTMTMSGSRSV1");
    }

    #[test]
    fn sequence_is_restartable() {
        let response = bank_document(&[single(statement_rs(CHECKING, scenario_list(), &ledger("925.00")))]);
        let fresh = build_statements(&response, &Config::default());
        let first: Vec<Statement> = fresh.clone().collect();
        let second: Vec<Statement> = fresh.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
