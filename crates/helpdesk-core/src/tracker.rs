//! Issue tracker boundary and its GitHub REST implementation.

use crate::config::GithubSettings;
use crate::labels::LabelSpec;
use async_trait::async_trait;
use helpdesk_proto::{CreatedIssue, Error, IssueRequest, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "github";

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, issue: &IssueRequest) -> Result<CreatedIssue>;

    /// Fails with a 404 `Error::Status` when the label does not exist.
    async fn get_label(&self, name: &str) -> Result<()>;

    async fn update_label(&self, label: &LabelSpec) -> Result<()>;

    async fn create_label(&self, label: &LabelSpec) -> Result<()>;

    /// Human-readable location, e.g. `owner/repo`.
    fn describe(&self) -> String;
}

pub struct GithubTracker {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
}

impl GithubTracker {
    pub fn new(settings: &GithubSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("helpdesk-triage-bot"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.token.trim()))
            .map_err(|e| Error::Invalid(format!("github token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::transport(SERVICE, e))?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        })
    }

    fn repo_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| Error::Invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| Error::Invalid(format!("{} cannot be a base URL", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| Error::transport(SERVICE, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| Error::parse(SERVICE, e))
    }
}

#[async_trait]
impl IssueTracker for GithubTracker {
    async fn create_issue(&self, issue: &IssueRequest) -> Result<CreatedIssue> {
        let url = self.repo_url(&["issues"])?;
        let created: CreatedIssue = self
            .send_json(self.http.post(url).json(&json!({
                "title": issue.title,
                "body": issue.body,
                "labels": issue.labels(),
            })))
            .await?;
        info!(number = created.number, url = %created.url, "issue created");
        Ok(created)
    }

    async fn get_label(&self, name: &str) -> Result<()> {
        let url = self.repo_url(&["labels", name])?;
        self.send(self.http.get(url)).await.map(|_| ())
    }

    async fn update_label(&self, label: &LabelSpec) -> Result<()> {
        let url = self.repo_url(&["labels", label.name.as_str()])?;
        debug!(label = %label.name, "updating label");
        self.send(self.http.patch(url).json(&json!({
            "new_name": label.name,
            "color": label.color,
            "description": label.description,
        })))
        .await
        .map(|_| ())
    }

    async fn create_label(&self, label: &LabelSpec) -> Result<()> {
        let url = self.repo_url(&["labels"])?;
        debug!(label = %label.name, "creating label");
        self.send(self.http.post(url).json(label)).await.map(|_| ())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tracker(server: &MockServer) -> GithubTracker {
        GithubTracker::new(&GithubSettings {
            token: "ghp_test".into(),
            owner: "acme".into(),
            repo: "desk".into(),
            api_base: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_issue_posts_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/desk/issues"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(header("x-github-api-version", "2022-11-28"))
            .and(body_partial_json(json!({
                "title": "Broken",
                "labels": ["type/bug", "ai-triaged"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 1_234_567,
                "number": 12,
                "url": "https://api.github.com/repos/acme/desk/issues/12",
                "html_url": "https://github.com/acme/desk/issues/12",
                "state": "open"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let issue = IssueRequest::new("Broken", "body")
            .with_label("type/bug")
            .with_label("ai-triaged");
        let created = tracker(&server).create_issue(&issue).await.unwrap();
        assert_eq!(created.number, 12);
        assert_eq!(created.url, "https://github.com/acme/desk/issues/12");
    }

    #[tokio::test]
    async fn test_label_names_are_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/desk/labels/type%2Fbug"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "type/bug"})))
            .mount(&server)
            .await;

        tracker(&server).get_label("type/bug").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_label_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = tracker(&server).get_label("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_describe() {
        let t = GithubTracker::new(&GithubSettings {
            token: "t".into(),
            owner: "o".into(),
            repo: "r".into(),
            api_base: "https://api.github.com".into(),
        })
        .unwrap();
        assert_eq!(t.describe(), "o/r");
    }
}
