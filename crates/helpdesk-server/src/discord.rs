//! Chat-platform interactions over HTTP: the interactions endpoint, deferred
//! follow-ups and command registration.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helpdesk_core::{ChatSettings, Command, CommandOption};
use helpdesk_proto::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SERVICE: &str = "discord";

const INTERACTION_PING: u8 = 1;
const INTERACTION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED: u8 = 5;

/// Message flag: visible only to the invoking user.
pub const EPHEMERAL: u64 = 64;

/// REST client for the parts of the chat API the bot needs.
#[derive(Clone)]
pub struct DiscordApi {
    http: reqwest::Client,
    api_base: String,
    application_id: String,
    bot_token: String,
}

impl DiscordApi {
    pub fn new(settings: &ChatSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            application_id: settings.application_id.clone(),
            bot_token: settings.bot_token.clone(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(Error::Status {
            service: SERVICE,
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    /// Replaces the placeholder left by a deferred response.
    pub async fn edit_original(&self, interaction_token: &str, content: &str) -> Result<()> {
        let url = format!(
            "{}/webhooks/{}/{interaction_token}/messages/@original",
            self.api_base, self.application_id
        );
        let response = self
            .http
            .patch(url)
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        Self::check(response).await?;
        Ok(())
    }

    /// Bulk-overwrites the command set. Guild commands appear instantly,
    /// global ones can take up to an hour.
    pub async fn register_commands(&self, guild_id: Option<&str>, commands: &Value) -> Result<usize> {
        let url = match guild_id {
            Some(guild) => format!(
                "{}/applications/{}/guilds/{guild}/commands",
                self.api_base, self.application_id
            ),
            None => format!("{}/applications/{}/commands", self.api_base, self.application_id),
        };
        let response = self
            .http
            .put(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(commands)
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        let registered: Vec<Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::parse(SERVICE, e))?;
        info!(count = registered.len(), guild = ?guild_id, "commands registered");
        Ok(registered.len())
    }
}

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl User {
    /// `name#1234`, or just `name` for accounts without a discriminator.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.username),
            _ => self.username.clone(),
        }
    }
}

impl Interaction {
    /// `<tag> (<id>)`. Guild interactions carry the user inside `member`.
    pub fn reporter(&self) -> String {
        self.member
            .as_ref()
            .map(|m| &m.user)
            .or(self.user.as_ref())
            .map_or_else(|| "unknown user".to_string(), |u| format!("{} ({})", u.tag(), u.id))
    }
}

fn message(content: &str, ephemeral: bool) -> Value {
    let mut data = json!({ "content": content });
    if ephemeral {
        data["flags"] = json!(EPHEMERAL);
    }
    json!({ "type": RESPONSE_MESSAGE, "data": data })
}

fn deferred(ephemeral: bool) -> Value {
    if ephemeral {
        json!({ "type": RESPONSE_DEFERRED, "data": { "flags": EPHEMERAL } })
    } else {
        json!({ "type": RESPONSE_DEFERRED })
    }
}

pub async fn interactions(State(state): State<Arc<AppState>>, Json(interaction): Json<Interaction>) -> Response {
    match interaction.kind {
        INTERACTION_PING => Json(json!({ "type": RESPONSE_PONG })).into_response(),
        INTERACTION_COMMAND => handle_command(&state, interaction).await,
        other => {
            debug!(kind = other, "unsupported interaction type");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": "Unsupported interaction type" }))).into_response()
        }
    }
}

async fn handle_command(state: &Arc<AppState>, interaction: Interaction) -> Response {
    let reporter = interaction.reporter();
    let Some(data) = interaction.data else {
        return Json(message("❌ Missing command data", true)).into_response();
    };
    let command = match Command::parse(&data.name, &data.options) {
        Ok(command) => command,
        Err(e) => {
            warn!(command = %data.name, error = %e, "rejected command");
            return Json(message(&format!("❌ {e}"), true)).into_response();
        }
    };

    if !command.is_deferred() {
        let reply = state.commands.dispatch(command, &reporter).await;
        return Json(message(&reply.content, reply.ephemeral)).into_response();
    }

    let ephemeral = command.is_ephemeral();
    let state = Arc::clone(state);
    let token = interaction.token;
    tokio::spawn(async move {
        let name = command.name();
        let reply = state.commands.dispatch(command, &reporter).await;
        let Some(chat) = &state.chat else {
            warn!(command = name, "chat API not configured, deferred reply dropped");
            return;
        };
        if let Err(e) = chat.edit_original(&token, &reply.content).await {
            error!(command = name, error = %e, "failed to deliver deferred reply");
        }
    });
    Json(deferred(ephemeral)).into_response()
}
