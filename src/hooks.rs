//! External post-processing hook
//!
//! When configured, sorting/renumbering/totals for statement sheets are
//! delegated to an external service. Fire-and-forget: the response body is
//! drained, failures are logged and ignored.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PostProcessHook {
    http: reqwest::Client,
    url: String,
}

impl PostProcessHook {
    pub fn new(url: String) -> Option<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;
        Some(Self { http, url })
    }

    /// Asks the hook to post-process the statement for one customer+month.
    pub async fn notify(&self, customer_id: &str, month: &str) {
        let body = json!({ "customerId": customer_id, "month": month });
        match self.http.post(&self.url).json(&body).send().await {
            Ok(resp) => {
                let status = resp.status();
                // Drain the body either way; the content is not interpreted.
                let _ = resp.text().await;
                if status.is_success() {
                    debug!(customer_id, month, "post-processing hook notified");
                } else {
                    warn!(customer_id, month, %status, "post-processing hook rejected");
                }
            }
            Err(e) => {
                warn!(customer_id, month, error = %e, "post-processing hook unreachable");
            }
        }
    }
}
