//! HTTP routing: `/health` plus the GraphQL endpoint.

use std::sync::Arc;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::schema::ApiSchema;
use crate::cache::RequestCache;
use crate::config;
use crate::context::RequestContext;
use crate::hooks::PostProcessHook;
use crate::identity::IdentityClient;
use crate::mirror::MirrorStore;
use crate::sheets::{SheetsApi, SheetsClient};

/// Shared application state; all handles constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub schema: ApiSchema,
    pub sheets: Arc<SheetsClient>,
    pub mirror: Arc<MirrorStore>,
    pub identity: Arc<IdentityClient>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/graphql", post(graphql_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Builds the per-request context (fresh cache, sheets session, call-time
/// hook config) and executes the GraphQL request against it.
async fn graphql_handler(State(state): State<AppState>, req: GraphQLRequest) -> GraphQLResponse {
    let cache = Arc::new(RequestCache::new());
    let session: Arc<dyn SheetsApi> = Arc::new(state.sheets.session(Arc::clone(&cache)));
    let hook = config::post_process_hook_url().and_then(PostProcessHook::new);
    let request_ctx = RequestContext::new(
        session,
        Arc::clone(&state.mirror),
        Arc::clone(&state.identity),
        hook,
        cache,
    );
    state
        .schema
        .execute(req.into_inner().data(request_ctx))
        .await
        .into()
}
