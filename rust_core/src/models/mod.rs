//! Shared value types passed between the telemetry client and the relay.

use std::fmt;

// ============================================================================
// Device events
// ============================================================================

/// A smart device (alarm, switch) changed state on the game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    /// Entity id of the device as reported by the server
    pub entity_id: u32,
    /// `true` when the device turned on / triggered
    pub active: bool,
}

impl DeviceEvent {
    pub fn new(entity_id: u32, active: bool) -> Self {
        Self { entity_id, active }
    }
}

// ============================================================================
// Server status
// ============================================================================

/// Snapshot of the game server's info, taken when the query completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub name: String,
    pub player_count: u32,
    pub max_players: u32,
    pub queued_players: u32,
}

// ============================================================================
// Telemetry link state
// ============================================================================

/// Lifecycle of the single telemetry connection attempt.
///
/// `Uninitialized -> Connecting -> Connected | Failed`. `Failed` is terminal
/// for the process; there is no reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryLink {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Failed,
}

impl TelemetryLink {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryLink::Uninitialized => "uninitialized",
            TelemetryLink::Connecting => "connecting",
            TelemetryLink::Connected => "connected",
            TelemetryLink::Failed => "failed",
        }
    }

    /// Only a connected link is worth querying.
    pub fn is_available(&self) -> bool {
        matches!(self, TelemetryLink::Connected)
    }
}

impl fmt::Display for TelemetryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
