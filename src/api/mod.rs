//! GraphQL surface and HTTP routing.

pub mod routes;
pub mod schema;

use async_graphql::ErrorExtensions;
use tracing::warn;

use crate::errors::DomainError;

/// Handlers catch nothing except to log and rethrow; every domain error
/// becomes a field error carrying a machine-readable code.
pub(crate) fn field_error(field: &'static str, err: DomainError) -> async_graphql::Error {
    warn!(field, code = err.code(), error = %err, "field failed");
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}
