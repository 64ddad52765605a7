//! Chat Sink Trait
//!
//! The relay talks to the chat platform only through [`ChatSink`], so it can be
//! driven by the Discord adapter in production and by a recording fake in tests.

use async_trait::async_trait;
use thiserror::Error;

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: u64,
    pub channel_id: u64,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// Destination channel is unknown to the client (not found / not cached)
    #[error("channel {0} not found")]
    ChannelNotFound(u64),
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound side of the chat client.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Send to a configured channel, resolving it first.
    ///
    /// Returns [`ChatError::ChannelNotFound`] when the channel cannot be resolved.
    async fn send_to_channel(&self, channel_id: u64, text: &str) -> Result<(), ChatError>;

    /// Reply in the channel a message came from.
    async fn reply(&self, channel_id: u64, text: &str) -> Result<(), ChatError>;
}
