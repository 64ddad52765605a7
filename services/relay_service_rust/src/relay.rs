//! Relay logic
//!
//! Maps telemetry device events to chat alerts and the `!status` chat command
//! to a telemetry status query. Both clients are injected; the relay owns no
//! sockets and spawns nothing, so every handler runs to completion on the
//! caller's loop. [`spawn_device_pump`] feeds that loop from the telemetry
//! event stream.

use std::sync::{Arc, OnceLock};

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use raidbell_core::chat::{ChatError, ChatSink, InboundMessage};
use raidbell_core::telemetry::{TelemetryClient, TelemetryError};
use raidbell_core::{DeviceEvent, ServerStatus, TelemetryLink};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::formatters::{self, NOT_CONFIGURED, STATUS_COMMAND, STATUS_FAILED};

/// Everything the relay reacts to, one variant per event kind.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Chat session is ready; carries the bot's own user id
    ChatReady { bot_user_id: u64 },
    ChatMessage(InboundMessage),
    DeviceChanged(DeviceEvent),
}

/// Why a status query produced no status.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("telemetry not configured")]
    NotConfigured,
    #[error("telemetry link is {0}")]
    Unavailable(TelemetryLink),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Off/reset transition
    Ignored,
    Sent,
    /// Active, but nothing was delivered (no channel, unresolvable, send error)
    Skipped,
}

#[derive(Debug)]
pub enum MessageOutcome {
    /// Own message or not a command
    Ignored,
    /// `!status` was answered; the reply text was derived from this result
    Status(Result<ServerStatus, StatusError>),
}

pub struct Relay {
    telemetry: Option<Arc<dyn TelemetryClient>>,
    chat: Arc<dyn ChatSink>,
    alert_channel_id: Option<u64>,
    link: RwLock<TelemetryLink>,
    bot_user_id: OnceLock<u64>,
}

impl Relay {
    pub fn new(
        telemetry: Option<Arc<dyn TelemetryClient>>,
        chat: Arc<dyn ChatSink>,
        alert_channel_id: Option<u64>,
    ) -> Self {
        Self {
            telemetry,
            chat,
            alert_channel_id,
            link: RwLock::new(TelemetryLink::Uninitialized),
            bot_user_id: OnceLock::new(),
        }
    }

    pub fn link(&self) -> TelemetryLink {
        *self.link.read()
    }

    pub async fn dispatch(&self, event: RelayEvent) {
        match event {
            RelayEvent::ChatReady { bot_user_id } => self.on_chat_ready(bot_user_id).await,
            RelayEvent::ChatMessage(message) => {
                self.handle_chat_message(&message).await;
            }
            RelayEvent::DeviceChanged(event) => {
                self.handle_device_event(&event).await;
            }
        }
    }

    /// Remember who we are, then make the one telemetry connect attempt.
    pub async fn on_chat_ready(&self, bot_user_id: u64) {
        if self.bot_user_id.set(bot_user_id).is_err() {
            debug!("Chat session ready again (user id already known)");
        }

        let Some(telemetry) = &self.telemetry else {
            warn!("❌ Rust Socket not initialized (Check env vars)");
            return;
        };

        {
            let mut link = self.link.write();
            if *link != TelemetryLink::Uninitialized {
                info!("Telemetry link is {}, not connecting again", *link);
                return;
            }
            *link = TelemetryLink::Connecting;
        }

        match telemetry.connect().await {
            Ok(()) => {
                *self.link.write() = TelemetryLink::Connected;
                info!("✅ Connected to Rust Server!");
            }
            Err(e) => {
                *self.link.write() = TelemetryLink::Failed;
                error!("❌ Failed to connect to Rust: {} (continuing chat-only)", e);
            }
        }
    }

    pub async fn handle_device_event(&self, event: &DeviceEvent) -> AlertOutcome {
        if !event.active {
            debug!("Device {} turned off, ignoring", event.entity_id);
            return AlertOutcome::Ignored;
        }

        info!("Smart Device triggered! ID: {}", event.entity_id);

        let Some(channel_id) = self.alert_channel_id else {
            debug!("No alert channel configured, dropping alert");
            return AlertOutcome::Skipped;
        };

        match self
            .chat
            .send_to_channel(channel_id, &formatters::format_alert(event))
            .await
        {
            Ok(()) => AlertOutcome::Sent,
            Err(ChatError::ChannelNotFound(_)) => AlertOutcome::Skipped,
            Err(e) => {
                error!("Failed to send alert for device {}: {}", event.entity_id, e);
                AlertOutcome::Skipped
            }
        }
    }

    pub async fn handle_chat_message(&self, message: &InboundMessage) -> MessageOutcome {
        if self.bot_user_id.get() == Some(&message.author_id) {
            return MessageOutcome::Ignored;
        }
        if message.content != STATUS_COMMAND {
            return MessageOutcome::Ignored;
        }

        let result = self.query_status().await;
        let reply = match &result {
            Ok(status) => formatters::format_status(status),
            Err(StatusError::NotConfigured) => NOT_CONFIGURED.to_string(),
            Err(e) => {
                warn!("Status query failed: {}", e);
                STATUS_FAILED.to_string()
            }
        };

        if let Err(e) = self.chat.reply(message.channel_id, &reply).await {
            error!("Failed to reply in channel {}: {}", message.channel_id, e);
        }

        MessageOutcome::Status(result)
    }

    /// Query only when telemetry is configured and the link is up.
    pub async fn query_status(&self) -> Result<ServerStatus, StatusError> {
        let telemetry = self.telemetry.as_ref().ok_or(StatusError::NotConfigured)?;

        let link = self.link();
        if !link.is_available() {
            return Err(StatusError::Unavailable(link));
        }

        Ok(telemetry.server_status().await?)
    }
}

// ============================================================================
// Device event pump
// ============================================================================

/// Forward telemetry device events into the relay queue, in order.
///
/// A lagging receiver logs the gap and keeps going; the task ends when the
/// event stream closes or the relay queue is gone.
pub fn spawn_device_pump(
    mut events: broadcast::Receiver<DeviceEvent>,
    queue: mpsc::Sender<RelayEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if queue.send(RelayEvent::DeviceChanged(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Relay fell behind, {} device events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Device event pump stopped");
    })
}
