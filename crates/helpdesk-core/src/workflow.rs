//! Optional hand-off of new tickets to an external workflow engine.

use crate::config::WorkflowConfig;
use chrono::Utc;
use helpdesk_proto::{Category, CategoryProfile, Severity};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// What gets routed alongside the new ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub ticket_url: String,
    pub category: Category,
    pub severity: Severity,
    pub reporter: String,
    pub subject: String,
    pub message: String,
    pub source: &'static str,
    pub needs_human: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Routed { run_id: Option<String> },
    Skipped { reason: &'static str },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatus {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub workflows: Vec<(String, String)>,
}

/// Triggers `POST {base}/workflows/{id}/trigger` with bearer auth.
pub struct PylonRouter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    prefix: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerResponse {
    #[serde(default)]
    workflow_run_id: Option<String>,
}

impl PylonRouter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            prefix: prefix.into(),
        }
    }

    pub fn workflow_id(&self, category: Category) -> String {
        let slug = match category {
            Category::Other => "general".to_string(),
            c => c.as_str().replace('_', "-"),
        };
        format!("{}-{slug}-workflow", self.prefix)
    }

    async fn trigger(&self, request: &RouteRequest) -> RouteOutcome {
        let workflow = self.workflow_id(request.category);
        let url = format!("{}/workflows/{workflow}/trigger", self.base_url);
        let payload = json!({
            "ticketUrl": request.ticket_url,
            "category": request.category,
            "severity": request.severity,
            "reporter": request.reporter,
            "subject": request.subject,
            "message": request.message,
            "source": request.source,
            "needsHuman": request.needs_human,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = match self.http.post(&url).bearer_auth(&self.api_key).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(workflow = %workflow, error = %e, "workflow routing failed");
                return RouteOutcome::Failed { error: e.to_string() };
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!(workflow = %workflow, status = %status, "workflow routing rejected");
            return RouteOutcome::Failed {
                error: format!("workflow engine returned {status}"),
            };
        }
        let run_id = response
            .json::<TriggerResponse>()
            .await
            .ok()
            .and_then(|r| r.workflow_run_id);
        info!(workflow = %workflow, run_id = ?run_id, "ticket routed to workflow");
        RouteOutcome::Routed { run_id }
    }
}

pub enum WorkflowRouter {
    Configured(PylonRouter),
    Disabled,
}

impl WorkflowRouter {
    /// Disabled unless an API key is configured.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                WorkflowRouter::Configured(PylonRouter::new(&config.base_url, key, &config.prefix))
            }
            _ => {
                info!("workflow routing disabled, PYLON_API_KEY not configured");
                WorkflowRouter::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, WorkflowRouter::Configured(_))
    }

    pub async fn route(&self, request: &RouteRequest) -> RouteOutcome {
        match self {
            WorkflowRouter::Configured(router) => router.trigger(request).await,
            WorkflowRouter::Disabled => RouteOutcome::Skipped {
                reason: "not_configured",
            },
        }
    }

    pub fn status(&self, profile: CategoryProfile) -> WorkflowStatus {
        match self {
            WorkflowRouter::Configured(router) => WorkflowStatus {
                enabled: true,
                base_url: Some(router.base_url.clone()),
                workflows: profile
                    .categories()
                    .iter()
                    .map(|&c| (c.as_str().to_string(), router.workflow_id(c)))
                    .collect(),
            },
            WorkflowRouter::Disabled => WorkflowStatus {
                enabled: false,
                base_url: None,
                workflows: Vec::new(),
            },
        }
    }
}
