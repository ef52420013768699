//! transferdesk - GraphQL backend-for-frontend over an identity provider, a
//! spreadsheet transfer ledger, and a relational mirror.
//!
//! Exposes the modules for the binary and the integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod hooks;
pub mod identity;
pub mod ledger;
pub mod mirror;
pub mod models;
pub mod sheets;
