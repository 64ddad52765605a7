//! Game Server Telemetry
//!
//! Defines the interface the relay uses to reach the game server:
//! - connect once
//! - fetch a [`ServerStatus`] snapshot
//! - subscribe to [`DeviceEvent`]s
//!
//! [`rustplus::RustPlusClient`] implements it over the Rust+ companion socket.

pub mod proto;
pub mod rustplus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{DeviceEvent, ServerStatus};

pub use rustplus::{RustPlusClient, RustPlusSettings};

/// Failure kinds of the telemetry client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("telemetry socket disconnected")]
    Disconnected,
    #[error("telemetry request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("server error: {0}")]
    Server(String),
}

impl TelemetryError {
    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryError::Connect(_) => "connect",
            TelemetryError::Disconnected => "disconnected",
            TelemetryError::Timeout => "timeout",
            TelemetryError::Malformed(_) => "malformed",
            TelemetryError::Server(_) => "server",
        }
    }
}

/// Common trait for game server telemetry clients
///
/// Implementations must be Send + Sync; the relay holds them behind `Arc<dyn _>`.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Open the connection to the game server.
    async fn connect(&self) -> Result<(), TelemetryError>;

    /// Fetch live server info.
    async fn server_status(&self) -> Result<ServerStatus, TelemetryError>;

    /// Subscribe to device state changes. Valid before `connect`; events flow
    /// once the connection is up.
    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent>;
}
