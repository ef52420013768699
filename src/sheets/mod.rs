//! Spreadsheet backend access
//!
//! The process owns one `SheetsClient`; each inbound request derives a
//! `SheetsSession` carrying the request-scoped cache for token and metadata
//! lookups. Ledger and statement code consume the `SheetsApi` trait so tests
//! can substitute an in-memory backend.

pub mod a1;
pub mod auth;
pub mod client;
pub mod types;

pub use client::{SheetsClient, SheetsSession};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use types::{Request, ValueInputMode};

#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Reads a range; empty vec when the range holds no rows.
    async fn values_get(&self, range: &str) -> Result<Vec<Vec<Value>>>;

    /// Overwrites a range.
    async fn values_update(
        &self,
        range: &str,
        rows: Vec<Vec<Value>>,
        mode: ValueInputMode,
    ) -> Result<()>;

    /// Appends rows after the last populated row of the range's table.
    async fn values_append(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<()>;

    /// Applies an ordered list of structural operations in one call.
    async fn batch_update(&self, requests: Vec<Request>) -> Result<()>;

    /// Numeric id of the tab with `title`, if it exists.
    async fn sheet_id(&self, title: &str) -> Result<Option<i64>>;

    /// Spreadsheet locale, e.g. `de_AT`.
    async fn locale(&self) -> Result<String>;

    /// Drops cached sheet metadata; must be called after adding sheets.
    async fn invalidate_metadata(&self);
}
