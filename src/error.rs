//! Error types for the OFX ledger library.

/// All errors that can occur while normalizing or merging OFX data.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A wire amount is not a signed decimal.
    #[error("malformed amount: {text:?}")]
    MalformedAmount {
        /// The offending wire text.
        text: String,
    },

    /// A wire date is not in the compact OFX date-time form.
    #[error("malformed date: {text:?}")]
    MalformedDate {
        /// The offending wire text.
        text: String,
    },

    /// The account element is not one of the supported shapes.
    #[error("unsupported account variant: {variant}")]
    UnsupportedAccountVariant {
        /// Element name or account type tag that was not recognized.
        variant: String,
    },

    /// A required aggregate or element is absent.
    #[error("missing required element: {element}")]
    MissingElement {
        /// OFX element name.
        element: &'static str,
    },

    /// A statement reports a start date after its end date.
    #[error("statement date range is inverted")]
    InvertedDateRange,

    /// The institution reported a non-success status for a response.
    #[error("institution returned status {code}: {message}")]
    FailedResponse {
        /// OFX status code.
        code: u32,
        /// Status message, if the institution supplied one.
        message: String,
    },

    /// No account with the given identifier exists.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// No transaction with the given identifier exists in the account.
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// A transaction with the same identifier is already stored in the
    /// account.
    #[error("transaction already exists: {0}")]
    DuplicateTransaction(String),

    /// Manual entries are only accepted on accounts without an institution link.
    #[error("account {0} is linked to an institution and does not accept manual entries")]
    ManualEntryNotAllowed(String),

    /// Repository backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = LedgerError::from(serde_err);
        assert!(matches!(err, LedgerError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn malformed_amount_display_quotes_text() {
        let err = LedgerError::MalformedAmount {
            text: "12.3.4".to_owned(),
        };
        assert_eq!(err.to_string(), r#"malformed amount: "12.3.4""#);
    }

    #[test]
    fn storage_display() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = LedgerError::Storage(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("file missing"));
    }

    #[test]
    fn failed_response_display() {
        let err = LedgerError::FailedResponse {
            code: 2000,
            message: "General error".to_owned(),
        };
        assert_eq!(err.to_string(), "institution returned status 2000: General error");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LedgerError>();
    }
}
