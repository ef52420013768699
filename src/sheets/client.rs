//! HTTP client for the spreadsheet REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::cache::RequestCache;
use crate::errors::{DomainError, Result};
use crate::sheets::auth::{self, AccessToken, ServiceAccountKey};
use crate::sheets::types::{
    BatchUpdateBody, Request, SpreadsheetMeta, ValueInputMode, ValueRange,
};
use crate::sheets::SheetsApi;

const DEFAULT_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const TOKEN_CACHE_KEY: &str = "sheets:token";
const META_CACHE_KEY: &str = "sheets:meta";

/// Process-wide handle; cheap to share, holds no per-request state.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    key: ServiceAccountKey,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, key: ServiceAccountKey) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::Io(format!("build sheets client: {}", e)))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE.to_string(),
            spreadsheet_id,
            key,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Derives the per-request session sharing this client.
    pub fn session(self: &Arc<Self>, cache: Arc<RequestCache>) -> SheetsSession {
        SheetsSession {
            client: Arc::clone(self),
            cache,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.spreadsheet_id, suffix)
    }
}

/// Request-scoped view over `SheetsClient`; token and sheet metadata are
/// memoized in the request cache and die with it.
pub struct SheetsSession {
    client: Arc<SheetsClient>,
    cache: Arc<RequestCache>,
}

impl SheetsSession {
    async fn token(&self) -> Result<String> {
        let fetched = self
            .cache
            .get_or_fetch(TOKEN_CACHE_KEY, || async {
                let token = auth::exchange_token(&self.client.http, &self.client.key).await?;
                Ok(serde_json::to_value(token)?)
            })
            .await?;
        let token: AccessToken = serde_json::from_value(fetched)?;
        if token.is_fresh(Utc::now().timestamp()) {
            return Ok(token.token);
        }

        // Near expiry within the same request; refetch once.
        self.cache.invalidate(TOKEN_CACHE_KEY).await;
        let refetched = self
            .cache
            .get_or_fetch(TOKEN_CACHE_KEY, || async {
                let token = auth::exchange_token(&self.client.http, &self.client.key).await?;
                Ok(serde_json::to_value(token)?)
            })
            .await?;
        let token: AccessToken = serde_json::from_value(refetched)?;
        Ok(token.token)
    }

    async fn meta(&self) -> Result<SpreadsheetMeta> {
        let raw = self
            .cache
            .get_or_fetch(META_CACHE_KEY, || async {
                let token = self.token().await?;
                let url = self
                    .client
                    .url("?fields=properties.locale,sheets.properties");
                let resp = self
                    .client
                    .http
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(DomainError::upstream("GET spreadsheet meta", status, &body));
                }
                Ok(resp.json::<Value>().await?)
            })
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    fn encoded(range: &str) -> String {
        // Path-segment escaping for the handful of characters sheet titles
        // may contain; everything else in A1 notation is URL-safe.
        range
            .replace('%', "%25")
            .replace(' ', "%20")
            .replace('\'', "%27")
            .replace('#', "%23")
            .replace('?', "%3F")
    }
}

#[async_trait]
impl SheetsApi for SheetsSession {
    async fn values_get(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let token = self.token().await?;
        let url = self
            .client
            .url(&format!("/values/{}", Self::encoded(range)));
        let resp = self.client.http.get(&url).bearer_auth(&token).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::upstream("GET values", status, &body));
        }
        let values: ValueRange = resp.json().await?;
        Ok(values.values)
    }

    async fn values_update(
        &self,
        range: &str,
        rows: Vec<Vec<Value>>,
        mode: ValueInputMode,
    ) -> Result<()> {
        let token = self.token().await?;
        let url = self.client.url(&format!(
            "/values/{}?valueInputOption={}",
            Self::encoded(range),
            mode.as_str()
        ));
        debug!(range, rows = rows.len(), "values update");
        let body = ValueRange {
            values: rows,
            ..Default::default()
        };
        let resp = self
            .client
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::upstream("PUT values", status, &body));
        }
        Ok(())
    }

    async fn values_append(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<()> {
        let token = self.token().await?;
        let url = self.client.url(&format!(
            "/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            Self::encoded(range)
        ));
        debug!(range, rows = rows.len(), "values append");
        let body = ValueRange {
            values: rows,
            ..Default::default()
        };
        let resp = self
            .client
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::upstream("POST values append", status, &body));
        }
        Ok(())
    }

    async fn batch_update(&self, requests: Vec<Request>) -> Result<()> {
        let token = self.token().await?;
        let url = self.client.url(":batchUpdate");
        debug!(count = requests.len(), "structural batch update");
        let resp = self
            .client
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&BatchUpdateBody { requests })
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::upstream("POST batchUpdate", status, &body));
        }
        Ok(())
    }

    async fn sheet_id(&self, title: &str) -> Result<Option<i64>> {
        let meta = self.meta().await?;
        Ok(meta
            .sheets
            .iter()
            .find(|s| s.properties.title.as_deref() == Some(title))
            .and_then(|s| s.properties.sheet_id))
    }

    async fn locale(&self) -> Result<String> {
        Ok(self.meta().await?.properties.locale)
    }

    async fn invalidate_metadata(&self) {
        self.cache.invalidate(META_CACHE_KEY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_encoding_covers_titles_with_spaces_and_quotes() {
        assert_eq!(SheetsSession::encoded("Master!A2:O2"), "Master!A2:O2");
        assert_eq!(
            SheetsSession::encoded("'Abrechnung u1 2025-03'!I4:I"),
            "%27Abrechnung%20u1%202025-03%27!I4:I"
        );
    }
}
