//! Settings that tune normalization and reconciliation.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use chrono::{FixedOffset, Offset as _, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::DEFAULT_FRACTION_DIGITS;

/// Largest supported minor-unit scale; keeps scaled amounts inside `i64`.
pub const MAX_FRACTION_DIGITS: u32 = 9;

/// Which fields the fallback duplicate rule compares when either side of a
/// pair lacks a stable transaction id.
///
/// All fields are compared exactly. Disabling a field widens the rule, so
/// the defaults are the conservative choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupPolicy {
    /// Compare calendar posting dates.
    pub match_date: bool,
    /// Compare amounts.
    pub match_amount: bool,
    /// Compare payee text.
    pub match_payee: bool,
}

impl Default for DedupPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            match_date: true,
            match_amount: true,
            match_payee: true,
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// UTC offset, in seconds, for wire dates that carry none when the
    /// institution does not declare one either.
    pub default_offset_seconds: i32,
    /// Number of fractional digits in one major currency unit.
    pub fraction_digits: u32,
    /// Fallback duplicate rule settings.
    pub dedup: DedupPolicy,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            default_offset_seconds: 0,
            fraction_digits: DEFAULT_FRACTION_DIGITS,
            dedup: DedupPolicy::default(),
        }
    }
}

impl Config {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Serialization`] if the document is malformed
    /// or a value is out of range.
    #[inline]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Serialization`] naming the offending field.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if FixedOffset::east_opt(self.default_offset_seconds).is_none() {
            return Err(invalid(format!(
                "defaultOffsetSeconds out of range: {}",
                self.default_offset_seconds
            )));
        }
        if self.fraction_digits > MAX_FRACTION_DIGITS {
            return Err(invalid(format!(
                "fractionDigits must be at most {MAX_FRACTION_DIGITS}, got {}",
                self.fraction_digits
            )));
        }
        Ok(())
    }

    /// Returns the configured default offset, or UTC if it is out of range.
    #[inline]
    #[must_use]
    pub fn default_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.default_offset_seconds).unwrap_or_else(|| Utc.fix())
    }
}

/// Builds a validation error in the same shape a bad document produces.
fn invalid(message: String) -> LedgerError {
    LedgerError::Serialization(<serde_json::Error as serde::de::Error>::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.fraction_digits, 2);
        assert!(config.dedup.match_date && config.dedup.match_amount && config.dedup.match_payee);
        assert_eq!(config.default_offset(), FixedOffset::east_opt(0).unwrap());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = Config::from_json_str(
            r#"{"defaultOffsetSeconds": -18000, "dedup": {"matchPayee": false}}"#,
        )
        .unwrap();
        assert_eq!(config.default_offset(), FixedOffset::west_opt(5 * 3600).unwrap());
        assert!(!config.dedup.match_payee);
        assert!(config.dedup.match_amount);
        assert_eq!(config.fraction_digits, 2);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let err = Config::from_json_str(r#"{"defaultOffsetSeconds": 90000}"#).unwrap_err();
        assert!(err.to_string().contains("defaultOffsetSeconds"));
    }

    #[test]
    fn oversized_scale_is_rejected() {
        let err = Config::from_json_str(r#"{"fractionDigits": 12}"#).unwrap_err();
        assert!(matches!(err, LedgerError::Serialization(_)));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["defaultOffsetSeconds"], 0);
        assert_eq!(json["dedup"]["matchAmount"], true);
    }
}
