//! Status, manual email intake and mailbox change notifications.

use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use helpdesk_core::MessageDisposition;
use helpdesk_proto::{Error, InboundEmail, TriageRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub profile: &'static str,
}

fn status(state: &AppState, status: &'static str, message: Option<String>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message,
        status,
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        profile: state.desk.profile().as_str(),
    })
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let message = format!("{} support agent API", state.desk.product());
    status(&state, "running", Some(message))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    status(&state, "ok", None)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEmailResponse {
    pub success: bool,
    pub issue_url: String,
    pub issue_number: u64,
    pub triage: TriageRecord,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Runs one email through the pipeline synchronously.
pub async fn process_email(State(state): State<Arc<AppState>>, Json(email): Json<InboundEmail>) -> Response {
    match state.desk.process_email(&email).await {
        Ok(outcome) => Json(ProcessEmailResponse {
            success: true,
            issue_url: outcome.issue.url,
            issue_number: outcome.issue.number,
            triage: outcome.record,
        })
        .into_response(),
        Err(Error::Invalid(reason)) => {
            debug!(%reason, "rejected email");
            error_response(StatusCode::BAD_REQUEST, "Missing required fields")
        }
        Err(e) => {
            error!(error = %e, "error processing email");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process email")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidationQuery {
    #[serde(rename = "validationToken")]
    pub validation_token: Option<String>,
}

fn echo_token(token: String) -> Response {
    info!("mailbox subscription validation");
    ([(header::CONTENT_TYPE, "text/plain")], token).into_response()
}

pub async fn validate_subscription(Query(query): Query<ValidationQuery>) -> Response {
    match query.validation_token {
        Some(token) => echo_token(token),
        None => error_response(StatusCode::BAD_REQUEST, "Missing validation token"),
    }
}

#[derive(Debug, Deserialize)]
pub struct Notifications {
    #[serde(default)]
    pub value: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub resource_data: Option<serde_json::Value>,
    #[serde(default)]
    pub client_state: Option<String>,
}

/// The message id is the last segment of the notification resource path.
pub fn message_id(resource: &str) -> Option<&str> {
    resource.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Accepts Graph change notifications and processes each message in the background.
///
/// Graph also validates a new subscription by POSTing here with a
/// `validationToken` query parameter.
pub async fn email_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidationQuery>,
    body: Bytes,
) -> Response {
    if let Some(token) = query.validation_token {
        return echo_token(token);
    }
    let notifications: Notifications = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "malformed change notification");
            return error_response(StatusCode::BAD_REQUEST, "Malformed notification");
        }
    };

    for notification in notifications.value {
        if notification.resource_data.is_none() {
            continue;
        }
        let foreign = state
            .client_state
            .as_deref()
            .is_some_and(|expected| notification.client_state.as_deref() != Some(expected));
        if foreign {
            warn!(resource = %notification.resource, "notification with unknown client state ignored");
            continue;
        }
        let Some(id) = message_id(&notification.resource).map(str::to_string) else {
            continue;
        };
        let desk = Arc::clone(&state.desk);
        tokio::spawn(async move {
            match desk.process_mailbox_message(&id).await {
                Ok(MessageDisposition::Processed(outcome)) => {
                    info!(id = %id, issue = %outcome.issue.url, "notified message processed");
                }
                Ok(MessageDisposition::Skipped(reason)) => debug!(id = %id, %reason, "notified message skipped"),
                Ok(MessageDisposition::Duplicate) => debug!(id = %id, "duplicate notification"),
                Err(e) => error!(id = %id, error = %e, "failed to process notified message"),
            }
        });
    }
    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use axum::body::Body;
    use axum::http::Request;
    use helpdesk_core::testing::{RecordingTracker, StaticMailbox};
    use helpdesk_core::SupportDesk;
    use helpdesk_proto::CategoryProfile;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, String) {
        let response = router(Arc::new(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn desk_with(tracker: Arc<RecordingTracker>) -> SupportDesk {
        SupportDesk::new(CategoryProfile::Support).with_tracker(tracker)
    }

    #[test]
    fn test_message_id_is_last_segment() {
        assert_eq!(message_id("Users/abc/Messages/AAMk=="), Some("AAMk=="));
        assert_eq!(message_id("Users/abc/Messages/"), None);
    }

    #[tokio::test]
    async fn test_health_reports_profile() {
        let state = AppState::new(Arc::new(SupportDesk::new(CategoryProfile::Api)));
        let (status, body) = send(state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["profile"], "api");
    }

    #[tokio::test]
    async fn test_process_email_creates_issue() {
        let tracker = Arc::new(RecordingTracker::new());
        let state = AppState::new(Arc::new(desk_with(tracker.clone())));
        let request = post_json(
            "/process-email",
            json!({ "from": "ann@corp.io", "subject": "Crash", "text": "the app crashes on start" }),
        );
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["issueNumber"], 1);
        assert_eq!(json["triage"]["category"], "bug");
        assert_eq!(tracker.issues()[0].title, "[Email] Crash");
    }

    #[tokio::test]
    async fn test_process_email_rejects_missing_fields() {
        let state = AppState::new(Arc::new(desk_with(Arc::new(RecordingTracker::new()))));
        let request = post_json("/process-email", json!({ "from": "ann@corp.io", "subject": "Hi" }));
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing required fields"));
    }

    #[tokio::test]
    async fn test_process_email_tracker_failure_is_500() {
        let state = AppState::new(Arc::new(desk_with(Arc::new(RecordingTracker::failing()))));
        let request = post_json(
            "/process-email",
            json!({ "from": { "name": "Ann", "email": "ann@corp.io" }, "subject": "Hi", "html": "<p>help</p>" }),
        );
        let (status, _) = send(state, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_validation_token_is_echoed() {
        let state = AppState::new(Arc::new(SupportDesk::new(CategoryProfile::Support)));
        let request = Request::get("/email-webhook?validationToken=abc%20123")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "abc 123");

        let state = AppState::new(Arc::new(SupportDesk::new(CategoryProfile::Support)));
        let (status, _) = send(state, Request::get("/email-webhook").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_notification_processes_message_once() {
        let tracker = Arc::new(RecordingTracker::new());
        let mailbox = StaticMailbox::new("support@desk.io").with_message(
            "AAMk1",
            "ann@corp.io",
            "Export broken",
            "csv export fails",
        );
        let desk = Arc::new(desk_with(tracker.clone()).with_mailbox(Arc::new(mailbox)));
        let notification = json!({ "value": [
            { "resource": "Users/support/Messages/AAMk1", "resourceData": { "id": "AAMk1" }, "clientState": "bot" },
            { "resource": "Users/support/Messages/AAMk1", "resourceData": { "id": "AAMk1" }, "clientState": "bot" },
            { "resource": "Users/support/Messages/AAMk1", "resourceData": { "id": "AAMk1" }, "clientState": "forged" }
        ]});

        let state = AppState::new(Arc::clone(&desk)).with_client_state("bot");
        let (status, _) = send(state, post_json("/email-webhook", notification)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        for _ in 0..50 {
            if !tracker.issues().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.issues().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_notification_is_400() {
        let state = AppState::new(Arc::new(SupportDesk::new(CategoryProfile::Support)));
        let request = Request::post("/email-webhook").body(Body::from("not json")).unwrap();
        let (status, _) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
