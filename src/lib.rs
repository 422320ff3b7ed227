//! Normalization and reconciliation of OFX statement responses.
//!
//! This crate turns parsed OFX responses from any institution into
//! canonical accounts, statements and transactions, and merges them into an
//! account's history without creating duplicates.
//!
//! The pipeline, leaf first:
//!
//! - [`codec`] decodes wire amounts and dates,
//! - [`resolver`] collapses the account variants into one canonical key,
//! - [`normalizer`] maps transaction records,
//! - [`builder`] assembles statements from a response envelope,
//! - [`merge`] folds a statement into an existing history.
//!
//! [`ledger::Ledger`] combines the pipeline with a [`repository::Repository`].

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod merge;
pub mod models;
pub mod normalizer;
pub mod protocol;
pub mod repository;
pub mod resolver;
