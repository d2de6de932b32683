//! Shared state handed to every handler.

use crate::discord::DiscordApi;
use helpdesk_core::{CommandDispatcher, SupportDesk};
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub desk: Arc<SupportDesk>,
    pub commands: CommandDispatcher,
    /// Needed to complete deferred interaction replies.
    pub chat: Option<DiscordApi>,
    /// Notifications carrying another client state are ignored.
    pub client_state: Option<String>,
    started: Instant,
}

impl AppState {
    pub fn new(desk: Arc<SupportDesk>) -> Self {
        Self {
            commands: CommandDispatcher::new(Arc::clone(&desk)),
            desk,
            chat: None,
            client_state: None,
            started: Instant::now(),
        }
    }

    pub fn with_chat(mut self, chat: Option<DiscordApi>) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_client_state(mut self, client_state: impl Into<String>) -> Self {
        self.client_state = Some(client_state.into());
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
