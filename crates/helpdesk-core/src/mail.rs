//! Mail boundary: sending acknowledgements and reading the support mailbox
//! through Microsoft Graph.

use crate::cache::TtlCache;
use crate::config::GraphSettings;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use helpdesk_proto::{Error, InboundEmail, Result, Sender};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "graph";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Subscriptions for new mail are created with this lifetime.
pub const SUBSCRIPTION_LIFETIME_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl OutgoingMail {
    /// A reply to `subject` whose plain-text body is converted to HTML line breaks.
    pub fn reply(to: impl Into<String>, subject: &str, text: &str) -> Self {
        Self {
            to: to.into(),
            subject: format!("Re: {subject}"),
            html_body: text.replace('\n', "<br>"),
        }
    }
}

/// A message as stored in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxMessage {
    pub id: String,
    pub subject: String,
    pub from: Option<Sender>,
    pub body: String,
    pub body_is_html: bool,
    pub received_at: Option<DateTime<Utc>>,
}

impl MailboxMessage {
    pub fn sender_address(&self) -> &str {
        self.from.as_ref().map_or("", |s| s.email.as_str())
    }

    pub fn to_inbound(&self) -> InboundEmail {
        let (text, html) = if self.body_is_html {
            (None, Some(self.body.clone()))
        } else {
            (Some(self.body.clone()), None)
        };
        InboundEmail {
            from: self.from.clone(),
            subject: Some(self.subject.clone()),
            text,
            html,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<()>;
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn get_message(&self, id: &str) -> Result<MailboxMessage>;

    /// Messages received at or after `since`, newest first.
    async fn list_recent(&self, since: DateTime<Utc>, top: u32) -> Result<Vec<MailboxMessage>>;

    /// The address the bot itself sends from.
    fn own_address(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub id: String,
    pub change_type: String,
    pub notification_url: String,
    pub resource: String,
    pub expiration_date_time: String,
    #[serde(default)]
    pub client_state: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct GraphList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<GraphRecipient>,
    #[serde(default)]
    body: Option<GraphBody>,
    #[serde(default)]
    received_date_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: GraphAddress,
}

#[derive(Deserialize)]
struct GraphAddress {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    content: String,
}

impl From<GraphMessage> for MailboxMessage {
    fn from(message: GraphMessage) -> Self {
        let body = message.body.unwrap_or(GraphBody {
            content_type: String::new(),
            content: String::new(),
        });
        Self {
            id: message.id,
            subject: message.subject.unwrap_or_default(),
            from: message.from.map(|f| Sender {
                name: f.email_address.name,
                email: f.email_address.address,
            }),
            body_is_html: body.content_type.eq_ignore_ascii_case("html"),
            body: body.content,
            received_at: message.received_date_time,
        }
    }
}

/// Client-credentials Graph client scoped to one mailbox.
pub struct GraphClient {
    http: reqwest::Client,
    settings: GraphSettings,
    token: TtlCache<String>,
}

impl GraphClient {
    pub fn new(settings: GraphSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            token: TtlCache::new(Duration::from_secs(3600)),
        }
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.get().await {
            return Ok(token);
        }
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.login_base, self.settings.tenant_id
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        let token: TokenResponse = check(response).await?.json().await.map_err(|e| Error::parse(SERVICE, e))?;

        // refresh a minute early
        let lifetime = token.expires_in.unwrap_or(3600).saturating_sub(60);
        self.token
            .insert_for(token.access_token.clone(), Duration::from_secs(lifetime))
            .await;
        debug!(lifetime, "graph token acquired");
        Ok(token.access_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.graph_base)
    }

    fn mailbox_path(&self) -> String {
        format!("/users/{}", self.settings.user_id)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::parse(SERVICE, e))
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let list: GraphList<Subscription> = self.get_json("/subscriptions", &[]).await?;
        Ok(list.value)
    }

    pub async fn create_subscription(&self, notification_url: &str, client_state: &str) -> Result<Subscription> {
        let expires = Utc::now() + chrono::Duration::days(SUBSCRIPTION_LIFETIME_DAYS);
        let request = Subscription {
            id: String::new(),
            change_type: "created".to_string(),
            notification_url: notification_url.to_string(),
            resource: format!("{}/messages", self.mailbox_path()),
            expiration_date_time: expires.to_rfc3339_opts(SecondsFormat::Millis, true),
            client_state: Some(client_state.to_string()),
        };
        let token = self.access_token().await?;
        let mut body = serde_json::to_value(&request)?;
        if let Some(object) = body.as_object_mut() {
            object.remove("id");
        }
        let response = self
            .http
            .post(self.url("/subscriptions"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        let created: Subscription = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::parse(SERVICE, e))?;
        info!(id = %created.id, expires = %created.expiration_date_time, "mail subscription created");
        Ok(created)
    }

    pub async fn delete_subscription(&self, id: &str) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .http
            .delete(self.url(&format!("/subscriptions/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        check(response).await.map(|_| ())
    }

    /// Replaces this bot's subscriptions with a fresh one.
    ///
    /// Subscriptions owned by other applications (a different `clientState`)
    /// are left alone. Returns the new subscription and how many were removed.
    pub async fn refresh_subscription(
        &self,
        notification_url: &str,
        client_state: &str,
    ) -> Result<(Subscription, usize)> {
        let existing = self.list_subscriptions().await?;
        let mut removed = 0;
        for sub in existing
            .iter()
            .filter(|s| s.client_state.as_deref() == Some(client_state))
        {
            self.delete_subscription(&sub.id).await?;
            removed += 1;
        }
        let created = self.create_subscription(notification_url, client_state).await?;
        Ok((created, removed))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
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

#[async_trait]
impl Mailer for GraphClient {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.url(&format!("{}/sendMail", self.mailbox_path())))
            .bearer_auth(token)
            .json(&json!({
                "message": {
                    "subject": mail.subject,
                    "body": { "contentType": "HTML", "content": mail.html_body },
                    "toRecipients": [{ "emailAddress": { "address": mail.to } }]
                },
                "saveToSentItems": true
            }))
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        check(response).await?;
        info!(to = %mail.to, "acknowledgement sent");
        Ok(())
    }
}

#[async_trait]
impl Mailbox for GraphClient {
    async fn get_message(&self, id: &str) -> Result<MailboxMessage> {
        let message: GraphMessage = self
            .get_json(&format!("{}/messages/{id}", self.mailbox_path()), &[])
            .await?;
        Ok(message.into())
    }

    async fn list_recent(&self, since: DateTime<Utc>, top: u32) -> Result<Vec<MailboxMessage>> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let list: GraphList<GraphMessage> = self
            .get_json(
                &format!("{}/messages", self.mailbox_path()),
                &[
                    ("$filter", format!("receivedDateTime ge {since}")),
                    ("$orderby", "receivedDateTime desc".to_string()),
                    ("$top", top.to_string()),
                ],
            )
            .await?;
        Ok(list.value.into_iter().map(MailboxMessage::from).collect())
    }

    fn own_address(&self) -> &str {
        &self.settings.user_id
    }
}
