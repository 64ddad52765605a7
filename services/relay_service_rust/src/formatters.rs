use raidbell_core::{DeviceEvent, ServerStatus};

/// The only chat command the relay answers.
pub const STATUS_COMMAND: &str = "!status";

pub const STATUS_FAILED: &str =
    "❌ Could not get server info (Game might be down or bot disconnected).";

pub const NOT_CONFIGURED: &str = "❌ Bot is not configured for Rust.";

pub fn format_alert(event: &DeviceEvent) -> String {
    format!(
        "@everyone 🚨 **RAID ALARM TRIGGERED!** 🚨\nDevice ID: {} is ACTIVE.",
        event.entity_id
    )
}

pub fn format_status(status: &ServerStatus) -> String {
    format!(
        "Server: {}\nPlayers: {}/{}\nQueued: {}",
        status.name, status.player_count, status.max_players, status.queued_players
    )
}
