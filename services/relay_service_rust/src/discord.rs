//! Discord adapter
//!
//! `DiscordHandler` only forwards gateway events onto the relay's queue;
//! `DiscordSink` is the relay's outbound path over serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use raidbell_core::chat::{ChatError, ChatSink, InboundMessage};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::{Context, EventHandler, GatewayIntents};
use tokio::sync::mpsc;

use crate::relay::RelayEvent;

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

pub struct DiscordHandler {
    events: mpsc::Sender<RelayEvent>,
}

impl DiscordHandler {
    pub fn new(events: mpsc::Sender<RelayEvent>) -> Self {
        Self { events }
    }

    async fn forward(&self, event: RelayEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Relay loop has stopped, dropping chat event");
        }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);
        self.forward(RelayEvent::ChatReady {
            bot_user_id: ready.user.id.get(),
        })
        .await;
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        let inbound = InboundMessage {
            author_id: msg.author.id.get(),
            channel_id: msg.channel_id.get(),
            content: msg.content,
        };
        self.forward(RelayEvent::ChatMessage(inbound)).await;
    }
}

#[derive(Clone)]
pub struct DiscordSink {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    async fn say(&self, channel: ChannelId, text: &str) -> Result<(), ChatError> {
        channel
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| ChatError::Send(e.to_string()))
    }

    /// Whether any cached guild has this channel or an active thread with this id.
    fn is_cached(&self, channel: ChannelId) -> bool {
        self.cache.guilds().into_iter().any(|guild_id| {
            self.cache.guild(guild_id).is_some_and(|guild| {
                guild.channels.contains_key(&channel)
                    || guild.threads.iter().any(|thread| thread.id == channel)
            })
        })
    }
}

#[async_trait]
impl ChatSink for DiscordSink {
    async fn send_to_channel(&self, channel_id: u64, text: &str) -> Result<(), ChatError> {
        if channel_id == 0 {
            return Err(ChatError::ChannelNotFound(channel_id));
        }
        let channel = ChannelId::new(channel_id);

        if !self.is_cached(channel) {
            return Err(ChatError::ChannelNotFound(channel_id));
        }
        self.say(channel, text).await
    }

    async fn reply(&self, channel_id: u64, text: &str) -> Result<(), ChatError> {
        if channel_id == 0 {
            return Err(ChatError::ChannelNotFound(channel_id));
        }
        self.say(ChannelId::new(channel_id), text).await
    }
}
