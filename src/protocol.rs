//! Read-only OFX response message model.
//!
//! These types mirror the OFX aggregates the normalization pipeline reads.
//! Field names on the wire are the OFX element names, so any serde format
//! that renders an OFX document as nested maps can be deserialized here
//! (JSON is used by the CLI and the tests).
//!
//! Aggregates that the protocol defines as "one of several elements" are
//! closed tagged unions. Each carries an explicit fallback arm holding the
//! element name when the document contains something this model does not
//! recognize, so callers can log and skip instead of failing the whole
//! document.

/// Generates a closed tagged union keyed by OFX element name.
///
/// The generated `Deserialize` impl reads a map, takes the first entry whose
/// key is a known element, and ignores the rest. A map with no known key
/// becomes the fallback variant carrying the first key seen.
macro_rules! tagged_union {
    (
        $(#[$meta:meta])*
        pub enum $name:ident, fallback $fallback:ident {
            $(
                $(#[$vmeta:meta])*
                $tag:literal => $variant:ident($inner:ty),
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant($inner),
            )+
            /// An element this model does not recognize.
            $fallback {
                /// Element name as it appeared in the document.
                kind: String,
            },
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                /// Visits the single-element map.
                struct TagVisitor;

                impl<'de> serde::de::Visitor<'de> for TagVisitor {
                    type Value = $name;

                    fn expecting(
                        &self,
                        formatter: &mut core::fmt::Formatter<'_>,
                    ) -> core::fmt::Result {
                        formatter.write_str(concat!(
                            "a map keyed by one of:",
                            $(" ", $tag,)+
                        ))
                    }

                    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                    where
                        A: serde::de::MapAccess<'de>,
                    {
                        let mut found: Option<$name> = None;
                        let mut first_unknown: Option<String> = None;
                        while let Some(key) = map.next_key::<String>()? {
                            match key.as_str() {
                                $(
                                    $tag if found.is_none() => {
                                        found = Some($name::$variant(map.next_value()?));
                                    }
                                )+
                                _ => {
                                    let serde::de::IgnoredAny = map.next_value()?;
                                    if first_unknown.is_none() {
                                        first_unknown = Some(key);
                                    }
                                }
                            }
                        }
                        Ok(found.unwrap_or_else(|| $name::$fallback {
                            kind: first_unknown.unwrap_or_default(),
                        }))
                    }
                }

                deserializer.deserialize_map(TagVisitor)
            }
        }
    };
}

mod account;
mod envelope;
mod signup;
mod statement;

pub use account::{
    AccountFrom, AccountInfo, AccountInfoDetails, BankAccount, BankAccountInfo,
    CreditCardAccount, CreditCardAccountInfo, LoanAccount, LoanAccountInfo,
};
pub use envelope::{
    BankResponse, CreditCardResponse, FinancialInstitution, OfxResponse, ResponseMessageSet,
    SignonMessageSet, SignonResponse, Status,
};
pub use signup::{AccountInfoResponse, AccountInfoTransactionResponse, SignupResponse};
pub use statement::{
    Balance, CreditCardStatementResponse, CreditCardStatementSyncResponse,
    CreditCardStatementTransactionResponse, Payee, StatementResponse, StatementSyncResponse,
    StatementTransaction, StatementTransactionResponse, TransactionList,
};
