//! Environment configuration
//!
//! Every option is read from the environment at call time; nothing is cached
//! process-wide except the client handles built from these values in `main`.

use std::env;

/// Identity provider base URL.
pub fn identity_base_url() -> String {
    env::var("IDENTITY_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// Service token for identity-provider calls.
pub fn identity_token() -> String {
    env::var("IDENTITY_SERVICE_TOKEN").unwrap_or_default()
}

/// Spreadsheet id of the operational ledger.
pub fn spreadsheet_id() -> String {
    env::var("LEDGER_SPREADSHEET_ID").unwrap_or_default()
}

/// Service-account credentials: inline JSON, or a path to a JSON key file.
pub fn service_account_json() -> Option<String> {
    if let Ok(inline) = env::var("SHEETS_SERVICE_ACCOUNT_JSON") {
        return Some(inline);
    }
    let path = env::var("SHEETS_SERVICE_ACCOUNT_FILE").ok()?;
    std::fs::read_to_string(path).ok()
}

/// Optional external post-processing hook for statement sheets.
pub fn post_process_hook_url() -> Option<String> {
    env::var("STATEMENT_HOOK_URL").ok().filter(|v| !v.is_empty())
}

/// Push-notification signing key; delivery is handled elsewhere, the option
/// is only recognized and surfaced at startup.
pub fn push_signing_key() -> Option<String> {
    env::var("PUSH_VAPID_PRIVATE_KEY").ok().filter(|v| !v.is_empty())
}

/// Contact subject accompanying the push signing key.
pub fn push_contact_subject() -> Option<String> {
    env::var("PUSH_CONTACT_SUBJECT").ok().filter(|v| !v.is_empty())
}

/// SQLite path for the relational mirror.
pub fn mirror_db_path() -> String {
    env::var("MIRROR_DB_PATH").unwrap_or_else(|_| "transferdesk.db".to_string())
}

/// Bind address for the HTTP server.
pub fn bind_addr() -> String {
    env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Not set in the test environment.
        std::env::remove_var("MIRROR_DB_PATH");
        std::env::remove_var("BIND_ADDR");
        assert_eq!(mirror_db_path(), "transferdesk.db");
        assert_eq!(bind_addr(), "0.0.0.0:3001");
    }

    #[test]
    fn empty_hook_url_counts_as_unset() {
        std::env::set_var("STATEMENT_HOOK_URL", "");
        assert!(post_process_hook_url().is_none());
        std::env::remove_var("STATEMENT_HOOK_URL");
    }
}
