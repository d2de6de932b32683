//! Configuration for the helpdesk bot.
//!
//! Values come from an optional YAML file and are then overlaid by
//! environment variables, which always win. The CLI loads a `.env` file
//! before either step runs.

use crate::redaction::RedactionPolicy;
use helpdesk_proto::{CategoryProfile, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpdeskConfig {
    pub profile: CategoryProfile,
    pub redaction: RedactionPolicy,
    pub product: ProductConfig,
    pub model: ModelConfig,
    pub github: GithubConfig,
    pub mail: MailConfig,
    pub docs: DocsConfig,
    pub workflow: WorkflowConfig,
    pub poll: PollConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    pub name: String,
    pub docs_url: Option<String>,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            name: "our product".to_string(),
            docs_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub ask_timeout_secs: u64,
    pub triage_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            ask_timeout_secs: 15,
            triage_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            api_base: "https://api.github.com".to_string(),
        }
    }
}

/// Fully resolved tracker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubSettings {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub api_base: String,
}

impl GithubConfig {
    pub fn require(&self) -> Result<GithubSettings> {
        Ok(GithubSettings {
            token: required(self.token.as_ref(), "GITHUB_TOKEN")?,
            owner: required(self.owner.as_ref(), "GITHUB_OWNER")?,
            repo: required(self.repo.as_ref(), "GITHUB_REPO")?,
            api_base: self.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Mailbox the bot reads from and sends as.
    pub user_id: Option<String>,
    pub multi_tenant: bool,
    pub notification_url: Option<String>,
    pub client_state: String,
    /// Send an acknowledgement email after a ticket is opened.
    pub acknowledge: bool,
    pub graph_base: String,
    pub login_base: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            user_id: None,
            multi_tenant: false,
            notification_url: None,
            client_state: "helpdesk-triage-bot".to_string(),
            acknowledge: true,
            graph_base: "https://graph.microsoft.com/v1.0".to_string(),
            login_base: "https://login.microsoftonline.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_id: String,
    pub graph_base: String,
    pub login_base: String,
}

impl MailConfig {
    pub fn require(&self) -> Result<GraphSettings> {
        let tenant_id = if self.multi_tenant {
            "common".to_string()
        } else {
            required(self.tenant_id.as_ref(), "MICROSOFT_TENANT_ID")?
        };
        Ok(GraphSettings {
            tenant_id,
            client_id: required(self.client_id.as_ref(), "MICROSOFT_CLIENT_ID")?,
            client_secret: required(self.client_secret.as_ref(), "MICROSOFT_CLIENT_SECRET")?,
            user_id: required(self.user_id.as_ref(), "MICROSOFT_USER_ID")?,
            graph_base: self.graph_base.trim_end_matches('/').to_string(),
            login_base: self.login_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn require_notification_url(&self) -> Result<String> {
        required(self.notification_url.as_ref(), "WEBHOOK_NOTIFICATION_URL")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub source_url: Option<String>,
    pub api_key: Option<String>,
    pub ttl_secs: u64,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            api_key: None,
            ttl_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub prefix: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.pylon.com".to_string(),
            prefix: "helpdesk".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub lookback_secs: u64,
    pub dedup_capacity: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 120,
            lookback_secs: 600,
            dedup_capacity: crate::dedup::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub bot_token: Option<String>,
    pub application_id: Option<String>,
    pub guild_id: Option<String>,
    pub api_base: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            application_id: None,
            guild_id: None,
            api_base: "https://discord.com/api/v10".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub bot_token: String,
    pub application_id: String,
    pub guild_id: Option<String>,
    pub api_base: String,
}

impl ChatConfig {
    pub fn require(&self) -> Result<ChatSettings> {
        Ok(ChatSettings {
            bot_token: required(self.bot_token.as_ref(), "DISCORD_BOT_TOKEN")?,
            application_id: required(self.application_id.as_ref(), "DISCORD_CLIENT_ID")?,
            guild_id: self.guild_id.clone(),
            api_base: self.api_base.trim_end_matches('/').to_string(),
        })
    }
}

fn required(value: Option<&String>, var: &'static str) -> Result<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(Error::MissingConfig(var))
}

/// A group of environment variables that together enable one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Model,
    Tracker,
    Mail,
    Chat,
    Docs,
    Workflow,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Model => "model",
            Feature::Tracker => "tracker",
            Feature::Mail => "mail",
            Feature::Chat => "chat",
            Feature::Docs => "docs",
            Feature::Workflow => "workflow",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" => Ok(Feature::Model),
            "tracker" | "github" => Ok(Feature::Tracker),
            "mail" | "email" => Ok(Feature::Mail),
            "chat" | "discord" => Ok(Feature::Chat),
            "docs" => Ok(Feature::Docs),
            "workflow" | "pylon" => Ok(Feature::Workflow),
            other => Err(format!("unknown feature '{other}'")),
        }
    }
}

/// One row of the environment report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCheck {
    pub var: &'static str,
    pub feature: Feature,
    pub present: bool,
    /// Optional variables never make the feature unusable.
    pub optional: bool,
}

impl HelpdeskConfig {
    /// Parses a YAML document. Missing sections take their defaults.
    pub fn parse_yaml(content: &str) -> std::result::Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would stop a long-running task at startup.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "POLL_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_yaml(&content)
    }

    /// Loads the optional file and overlays the process environment.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Overlays values from `lookup`. Blank values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let set = |slot: &mut Option<String>, var: &str| {
            if let Some(value) = get(var) {
                *slot = Some(value);
            }
        };
        let set_string = |slot: &mut String, var: &str| {
            if let Some(value) = get(var) {
                *slot = value;
            }
        };

        if let Some(raw) = get("HELPDESK_PROFILE") {
            self.profile = CategoryProfile::parse(&raw).ok_or(ConfigError::InvalidValue {
                var: "HELPDESK_PROFILE",
                value: raw,
            })?;
        }
        if let Some(raw) = get("HELPDESK_REDACTION") {
            self.redaction = RedactionPolicy::parse(&raw).ok_or(ConfigError::InvalidValue {
                var: "HELPDESK_REDACTION",
                value: raw,
            })?;
        }

        set_string(&mut self.product.name, "HELPDESK_PRODUCT_NAME");
        set(&mut self.product.docs_url, "DOCS_URL");

        set(&mut self.model.api_key, "OPENAI_API_KEY");
        set_string(&mut self.model.model, "OPENAI_MODEL");
        set_string(&mut self.model.base_url, "OPENAI_BASE_URL");

        set(&mut self.github.token, "GITHUB_TOKEN");
        set(&mut self.github.owner, "GITHUB_OWNER");
        set(&mut self.github.repo, "GITHUB_REPO");
        set_string(&mut self.github.api_base, "GITHUB_API_URL");

        set(&mut self.mail.tenant_id, "MICROSOFT_TENANT_ID");
        set(&mut self.mail.client_id, "MICROSOFT_CLIENT_ID");
        set(&mut self.mail.client_secret, "MICROSOFT_CLIENT_SECRET");
        set(&mut self.mail.user_id, "MICROSOFT_USER_ID");
        set(&mut self.mail.notification_url, "WEBHOOK_NOTIFICATION_URL");
        if let Some(raw) = get("MICROSOFT_MULTI_TENANT") {
            self.mail.multi_tenant = parse_flag("MICROSOFT_MULTI_TENANT", raw)?;
        }
        if let Some(raw) = get("HELPDESK_ACKNOWLEDGE") {
            self.mail.acknowledge = parse_flag("HELPDESK_ACKNOWLEDGE", raw)?;
        }

        set(&mut self.docs.source_url, "DOCS_SOURCE_URL");
        set(&mut self.docs.api_key, "DOCS_API_KEY");

        set(&mut self.workflow.api_key, "PYLON_API_KEY");
        set_string(&mut self.workflow.base_url, "PYLON_API_URL");

        if let Some(raw) = get("POLL_INTERVAL_SECS") {
            self.poll.interval_secs = parse_number("POLL_INTERVAL_SECS", raw)?;
        }
        set_string(&mut self.server.bind, "HELPDESK_BIND");
        if let Some(raw) = get("PORT") {
            self.server.port = parse_number("PORT", raw)?;
        }

        set(&mut self.chat.bot_token, "DISCORD_BOT_TOKEN");
        set(&mut self.chat.application_id, "DISCORD_CLIENT_ID");
        set(&mut self.chat.guild_id, "DISCORD_GUILD_ID");

        self.validate()
    }

    /// Reports every recognized variable and whether a value is configured.
    pub fn check(&self) -> Vec<EnvCheck> {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let row = |var, feature, present, optional| EnvCheck {
            var,
            feature,
            present,
            optional,
        };
        vec![
            row("OPENAI_API_KEY", Feature::Model, has(&self.model.api_key), false),
            row("GITHUB_TOKEN", Feature::Tracker, has(&self.github.token), false),
            row("GITHUB_OWNER", Feature::Tracker, has(&self.github.owner), false),
            row("GITHUB_REPO", Feature::Tracker, has(&self.github.repo), false),
            row(
                "MICROSOFT_TENANT_ID",
                Feature::Mail,
                has(&self.mail.tenant_id) || self.mail.multi_tenant,
                false,
            ),
            row("MICROSOFT_CLIENT_ID", Feature::Mail, has(&self.mail.client_id), false),
            row(
                "MICROSOFT_CLIENT_SECRET",
                Feature::Mail,
                has(&self.mail.client_secret),
                false,
            ),
            row("MICROSOFT_USER_ID", Feature::Mail, has(&self.mail.user_id), false),
            row(
                "WEBHOOK_NOTIFICATION_URL",
                Feature::Mail,
                has(&self.mail.notification_url),
                true,
            ),
            row("DISCORD_BOT_TOKEN", Feature::Chat, has(&self.chat.bot_token), false),
            row(
                "DISCORD_CLIENT_ID",
                Feature::Chat,
                has(&self.chat.application_id),
                false,
            ),
            row("DISCORD_GUILD_ID", Feature::Chat, has(&self.chat.guild_id), true),
            row("DOCS_URL", Feature::Docs, has(&self.product.docs_url), true),
            row("DOCS_SOURCE_URL", Feature::Docs, has(&self.docs.source_url), true),
            row("DOCS_API_KEY", Feature::Docs, has(&self.docs.api_key), true),
            row("PYLON_API_KEY", Feature::Workflow, has(&self.workflow.api_key), true),
        ]
    }

    /// Required variables of the given features that have no value.
    pub fn missing_for(&self, features: &[Feature]) -> Vec<&'static str> {
        self.check()
            .into_iter()
            .filter(|c| features.contains(&c.feature) && !c.optional && !c.present)
            .map(|c| c.var)
            .collect()
    }
}

fn parse_flag(var: &'static str, raw: String) -> std::result::Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { var, value: raw }),
    }
}

fn parse_number<T: FromStr>(var: &'static str, raw: String) -> std::result::Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HelpdeskConfig::default();
        assert_eq!(config.profile, CategoryProfile::Support);
        assert_eq!(config.redaction, RedactionPolicy::Redact);
        assert_eq!(config.model.ask_timeout_secs, 15);
        assert_eq!(config.model.triage_timeout_secs, 20);
        assert_eq!(config.poll.dedup_capacity, 1000);
        assert_eq!(config.server.address(), "0.0.0.0:3000");
        assert_eq!(config.mail.client_state, "helpdesk-triage-bot");
        assert!(config.mail.acknowledge);
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "profile: api\nproduct:\n  name: Scrapey\nmodel:\n  ask_timeout_secs: 5\npoll:\n  interval_secs: 30"
        )
        .unwrap();

        let config = HelpdeskConfig::from_file(file.path()).unwrap();
        assert_eq!(config.profile, CategoryProfile::Api);
        assert_eq!(config.product.name, "Scrapey");
        assert_eq!(config.model.ask_timeout_secs, 5);
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.poll.interval_secs, 30);
        assert_eq!(config.poll.lookback_secs, 600);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = HelpdeskConfig::from_file("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = HelpdeskConfig::parse_yaml("github:\n  owner: from-file\n").unwrap();
        config
            .apply_env(env(&[
                ("GITHUB_OWNER", "from-env"),
                ("GITHUB_REPO", "desk"),
                ("GITHUB_TOKEN", "  "),
                ("HELPDESK_REDACTION", "pass-through"),
                ("PORT", "8080"),
            ]))
            .unwrap();
        assert_eq!(config.github.owner.as_deref(), Some("from-env"));
        assert_eq!(config.github.token, None);
        assert_eq!(config.redaction, RedactionPolicy::PassThrough);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_env_value_is_reported() {
        let mut config = HelpdeskConfig::default();
        let err = config.apply_env(env(&[("HELPDESK_PROFILE", "sales")])).unwrap_err();
        assert!(err.to_string().contains("HELPDESK_PROFILE"));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut config = HelpdeskConfig::default();
        let err = config.apply_env(env(&[("POLL_INTERVAL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "POLL_INTERVAL_SECS", .. }));

        let err = HelpdeskConfig::parse_yaml("poll:\n  interval_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));
        assert!(HelpdeskConfig::parse_yaml("poll:\n  interval_secs: 30\n").is_ok());
    }

    #[test]
    fn test_require_names_first_missing_variable() {
        let mut config = HelpdeskConfig::default();
        config.github.token = Some("t".into());
        let err = config.github.require().unwrap_err();
        assert!(matches!(err, Error::MissingConfig("GITHUB_OWNER")));
    }

    #[test]
    fn test_multi_tenant_skips_tenant_id() {
        let mut config = HelpdeskConfig::default();
        config
            .apply_env(env(&[
                ("MICROSOFT_MULTI_TENANT", "true"),
                ("MICROSOFT_CLIENT_ID", "c"),
                ("MICROSOFT_CLIENT_SECRET", "s"),
                ("MICROSOFT_USER_ID", "bot@desk.io"),
            ]))
            .unwrap();
        assert_eq!(config.mail.require().unwrap().tenant_id, "common");
    }

    #[test]
    fn test_missing_for_ignores_optional_and_unselected() {
        let mut config = HelpdeskConfig::default();
        config.model.api_key = Some("k".into());
        assert!(config.missing_for(&[Feature::Model, Feature::Docs]).is_empty());
        assert_eq!(
            config.missing_for(&[Feature::Tracker]),
            ["GITHUB_TOKEN", "GITHUB_OWNER", "GITHUB_REPO"]
        );
    }
}
