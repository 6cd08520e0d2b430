use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ConsoleResult;
use crate::gateway::ApiRequest;
use crate::identity::Operation;
use crate::pipeline::timefmt;

use super::Registry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user_id", default)]
    pub actor_id: Option<String>,
    #[serde(rename = "user_email", default)]
    pub actor_email: Option<String>,
    pub action: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(rename = "payload_json", default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Action filter, e.g. `admin.user.create`. Sent trimmed but otherwise as typed;
    /// the backend decides how it matches.
    pub action: Option<String>,
    pub limit: Option<u32>,
}

impl AuditQuery {
    pub fn action(action: &str) -> Self {
        Self { action: Some(action.to_string()), limit: None }
    }

    fn apply(&self, mut req: ApiRequest) -> ApiRequest {
        if let Some(a) = self.action.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            req = req.query("action", a);
        }
        if let Some(n) = self.limit {
            req = req.query("limit", &n.clamp(1, 1000).to_string());
        }
        req
    }
}

impl Registry {
    pub async fn list_audit(&self, query: &AuditQuery, cancel: &CancellationToken) -> ConsoleResult<Vec<AuditEvent>> {
        self.client.authorize(Operation::ViewAudit)?;
        let req = query.apply(ApiRequest::get("/admin/audit").label("Audit load"));
        self.client.json(&req, cancel).await
    }
}
