//! transferdesk server entrypoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transferdesk::api::routes::{create_router, AppState};
use transferdesk::api::schema::build_schema;
use transferdesk::cache::RequestCache;
use transferdesk::config;
use transferdesk::identity::IdentityClient;
use transferdesk::ledger::codec;
use transferdesk::mirror::MirrorStore;
use transferdesk::sheets::auth::ServiceAccountKey;
use transferdesk::sheets::SheetsClient;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transferdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let key_json =
        config::service_account_json().context("service account credentials not configured")?;
    let key = ServiceAccountKey::from_json(&key_json)?;
    let sheets = Arc::new(SheetsClient::new(config::spreadsheet_id(), key)?);
    let mirror = Arc::new(MirrorStore::new(&config::mirror_db_path())?);
    let identity = Arc::new(IdentityClient::new(
        config::identity_base_url(),
        config::identity_token(),
    )?);

    // One-time legacy header patch; no-op against a canonical master.
    let session = sheets.session(Arc::new(RequestCache::new()));
    if codec::migrate_legacy_header(&session).await? {
        info!("master header migrated to canonical layout");
    }

    if config::push_signing_key().is_some() {
        let subject = config::push_contact_subject().unwrap_or_default();
        info!(%subject, "push signing key present; delivery handled externally");
    }

    let state = AppState {
        schema: build_schema(),
        sheets,
        mirror,
        identity,
    };
    let app = create_router(state);

    let addr = config::bind_addr();
    info!(%addr, "transferdesk listening");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
