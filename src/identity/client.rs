//! Identity provider client
//!
//! REST/RPC JSON calls for user search, grants, project roles, the v2 user
//! lifecycle endpoints, and the per-user key/value metadata store (values
//! base64-encoded on the wire). The provider's semantics are opaque here;
//! responses are flattened for the read API and nothing is persisted locally.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::RequestCache;
use crate::errors::{DomainError, Result};
use crate::models::{IdentityUser, ProjectRole, UserGrant};

/// Metadata keys maintained on completion.
pub const META_REVENUE: &str = "revenue";
pub const META_TRANSFER_COUNT: &str = "transferCount";
pub const META_MONTHLY_REVENUE: &str = "monthlyRevenue";
pub const META_MONTHLY_COUNT: &str = "monthlyCount";
pub const META_ROUTES: &str = "routes";

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<IdentityUser>,
}

#[derive(Deserialize)]
struct RolesResponse {
    #[serde(default)]
    roles: Vec<ProjectRole>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantWire {
    user_id: String,
    #[serde(default)]
    role_keys: Vec<String>,
}

#[derive(Deserialize)]
struct GrantsResponse {
    #[serde(default)]
    grants: Vec<GrantWire>,
}

#[derive(Deserialize)]
struct MetadataEntry {
    #[serde(default)]
    value: String,
}

pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    pub fn new(base_url: String, service_token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", service_token)
                        .parse()
                        .map_err(|_| {
                            DomainError::InvalidInput("invalid identity service token".into())
                        })?,
                );
                headers
            })
            .build()
            .map_err(|e| DomainError::Io(format!("build identity client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DomainError::NotFound(format!("{}: not found", what)));
        }
        Err(DomainError::upstream(what, status, &body))
    }

    // ===== Read APIs =====

    pub async fn search_users(&self, query: &str) -> Result<Vec<IdentityUser>> {
        let resp = self
            .http
            .get(self.url("/api/users/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        let resp = Self::check(resp, "user search").await?;
        Ok(resp.json::<UsersResponse>().await?.users)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<IdentityUser> {
        let resp = self
            .http
            .get(self.url(&format!("/api/users/{}", user_id)))
            .send()
            .await?;
        let resp = Self::check(resp, &format!("user {}", user_id)).await?;
        Ok(resp.json().await?)
    }

    pub async fn project_roles(&self) -> Result<Vec<ProjectRole>> {
        let resp = self.http.get(self.url("/api/project-roles")).send().await?;
        let resp = Self::check(resp, "project roles").await?;
        Ok(resp.json::<RolesResponse>().await?.roles)
    }

    /// Grants for a project, flattened to (user, role keys).
    pub async fn search_grants(&self, project: &str) -> Result<Vec<UserGrant>> {
        let resp = self
            .http
            .get(self.url("/api/grants/search"))
            .query(&[("project", project)])
            .send()
            .await?;
        let resp = Self::check(resp, "grant search").await?;
        let grants = resp.json::<GrantsResponse>().await?.grants;
        Ok(grants
            .into_iter()
            .map(|g| UserGrant {
                user_id: g.user_id,
                roles: g.role_keys,
            })
            .collect())
    }

    /// Display name for snapshot fields, memoized per request. Best-effort:
    /// lookup failures degrade to `None`.
    pub async fn display_name(&self, cache: &RequestCache, user_id: &str) -> Option<String> {
        let key = format!("identity:name:{}", user_id);
        let fetched = cache
            .get_or_fetch(&key, || async {
                let user = self.get_user(user_id).await?;
                Ok(json!(user.display_name.or(user.username)))
            })
            .await;
        match fetched {
            Ok(Value::String(name)) => Some(name),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id, error = %e, "display name enrichment failed");
                None
            }
        }
    }

    // ===== v2 user lifecycle =====

    pub async fn deactivate_user(&self, user_id: &str) -> Result<()> {
        self.lifecycle(user_id, "deactivate").await
    }

    pub async fn reactivate_user(&self, user_id: &str) -> Result<()> {
        self.lifecycle(user_id, "reactivate").await
    }

    pub async fn lock_user(&self, user_id: &str) -> Result<()> {
        self.lifecycle(user_id, "lock").await
    }

    pub async fn unlock_user(&self, user_id: &str) -> Result<()> {
        self.lifecycle(user_id, "unlock").await
    }

    async fn lifecycle(&self, user_id: &str, action: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/api/v2/users/{}/{}", user_id, action)))
            .send()
            .await?;
        Self::check(resp, &format!("user {} {}", user_id, action)).await?;
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/api/v2/users/{}", user_id)))
            .send()
            .await?;
        Self::check(resp, &format!("user {} delete", user_id)).await?;
        Ok(())
    }

    // ===== Metadata store =====

    /// Reads one metadata value; `None` when the key is absent.
    pub async fn get_metadata(&self, user_id: &str, key: &str) -> Result<Option<Value>> {
        let resp = self
            .http
            .get(self.url(&format!("/api/users/{}/metadata/{}", user_id, key)))
            .send()
            .await?;
        let resp = match Self::check(resp, &format!("metadata {}", key)).await {
            Ok(resp) => resp,
            Err(DomainError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry: MetadataEntry = resp.json().await?;
        let decoded = BASE64
            .decode(entry.value.as_bytes())
            .map_err(|e| DomainError::Io(format!("metadata {} not base64: {}", key, e)))?;
        Ok(Some(serde_json::from_slice(&decoded)?))
    }

    pub async fn set_metadata(&self, user_id: &str, key: &str, value: &Value) -> Result<()> {
        let encoded = BASE64.encode(serde_json::to_vec(value)?);
        let resp = self
            .http
            .put(self.url(&format!("/api/users/{}/metadata/{}", user_id, key)))
            .json(&json!({ "value": encoded }))
            .send()
            .await?;
        Self::check(resp, &format!("metadata {} write", key)).await?;
        Ok(())
    }

    /// Bumps the per-user revenue/count/route attributes after a completed
    /// transfer. Each write is independent; the first failure aborts the rest
    /// and surfaces to the caller, which treats the whole thing as
    /// best-effort.
    pub async fn record_completion(
        &self,
        user_id: &str,
        month: &str,
        amount_eur: f64,
        route: &str,
    ) -> Result<()> {
        debug!(user_id, month, amount_eur, route, "recording completion metadata");

        let revenue = self
            .get_metadata(user_id, META_REVENUE)
            .await?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        self.set_metadata(user_id, META_REVENUE, &json!(revenue + amount_eur))
            .await?;

        let count = self
            .get_metadata(user_id, META_TRANSFER_COUNT)
            .await?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        self.set_metadata(user_id, META_TRANSFER_COUNT, &json!(count + 1))
            .await?;

        let mut monthly_revenue = self
            .get_metadata(user_id, META_MONTHLY_REVENUE)
            .await?
            .unwrap_or_else(|| json!({}));
        if !monthly_revenue.is_object() {
            monthly_revenue = json!({});
        }
        let prev = monthly_revenue.get(month).and_then(|v| v.as_f64()).unwrap_or(0.0);
        monthly_revenue[month] = json!(prev + amount_eur);
        self.set_metadata(user_id, META_MONTHLY_REVENUE, &monthly_revenue)
            .await?;

        let mut monthly_count = self
            .get_metadata(user_id, META_MONTHLY_COUNT)
            .await?
            .unwrap_or_else(|| json!({}));
        if !monthly_count.is_object() {
            monthly_count = json!({});
        }
        let prev = monthly_count.get(month).and_then(|v| v.as_i64()).unwrap_or(0);
        monthly_count[month] = json!(prev + 1);
        self.set_metadata(user_id, META_MONTHLY_COUNT, &monthly_count)
            .await?;

        let mut routes = self
            .get_metadata(user_id, META_ROUTES)
            .await?
            .unwrap_or_else(|| json!([]));
        if !routes.is_array() {
            routes = json!([]);
        }
        if let Some(list) = routes.as_array_mut() {
            if !list.iter().any(|r| r == route) {
                list.push(json!(route));
            }
        }
        self.set_metadata(user_id, META_ROUTES, &routes).await
    }
}
