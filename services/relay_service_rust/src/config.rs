use anyhow::{Context, Result};
use log::{error, warn};
use raidbell_core::telemetry::rustplus::DEFAULT_COMPANION_PORT;
use raidbell_core::telemetry::RustPlusSettings;
use std::env;
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LIVENESS_PORT: u16 = 8080;

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    /// Destination for device alerts; `None` disables alert delivery
    pub alert_channel_id: Option<u64>,
    /// Rust+ connection; `None` runs the bot in chat-only mode
    pub rust: Option<RustPlusSettings>,
    pub liveness_port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("alert_channel_id", &self.alert_channel_id)
            .field("rust", &self.rust.as_ref().map(|r| r.url()))
            .field("liveness_port", &self.liveness_port)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. Only a missing `DISCORD_TOKEN` is an
    /// error; bad values elsewhere disable the feature they belong to.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup: Lookup = &lookup;

        let discord_token = non_empty(lookup, "DISCORD_TOKEN")
            .context("DISCORD_TOKEN must be set (bot token from the developer portal)")?;

        let alert_channel_id =
            parse_or_ignore::<NonZeroU64>(lookup, "ALERT_CHANNEL_ID").map(NonZeroU64::get);
        if alert_channel_id.is_none() {
            warn!("ALERT_CHANNEL_ID not set: device alerts will be skipped");
        }

        let liveness_port = parse_or_ignore::<u16>(lookup, "PORT").unwrap_or(DEFAULT_LIVENESS_PORT);

        let rust = rust_settings(lookup);
        if rust.is_none() {
            warn!("Rust config missing! Bot will not connect to game.");
        }

        Ok(Self {
            discord_token,
            alert_channel_id,
            rust,
            liveness_port,
        })
    }
}

fn rust_settings(lookup: Lookup) -> Option<RustPlusSettings> {
    let port = match parse_var::<u16>(lookup, "RUST_PORT") {
        Ok(port) => port.unwrap_or(DEFAULT_COMPANION_PORT),
        Err(e) => {
            error!("{:#}", e);
            return None;
        }
    };

    let host = non_empty(lookup, "RUST_IP");
    let player_id = parse_or_ignore::<u64>(lookup, "STEAM_ID");
    let player_token = parse_or_ignore::<i32>(lookup, "PLAYER_TOKEN");

    let (Some(host), Some(player_id), Some(player_token)) = (host, player_id, player_token) else {
        return None;
    };

    let mut settings = RustPlusSettings::new(host, port, player_id, player_token);
    if let Some(secs) = parse_or_ignore::<u64>(lookup, "RUST_CONNECT_TIMEOUT_SECS") {
        settings.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_or_ignore::<u64>(lookup, "RUST_REQUEST_TIMEOUT_SECS") {
        settings.request_timeout = Duration::from_secs(secs);
    }
    settings.watched_entities = parse_entity_list(lookup, "WATCHED_ENTITY_IDS");
    Some(settings)
}

fn non_empty(lookup: Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Ok(None)` when unset, `Err` when set but unparsable.
fn parse_var<T>(lookup: Lookup, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .with_context(|| format!("Invalid {key}: {raw} (expected a number)"))
}

fn parse_or_ignore<T>(lookup: Lookup, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_var(lookup, key).unwrap_or_else(|e| {
        error!("{:#}", e);
        None
    })
}

fn parse_entity_list(lookup: Lookup, key: &str) -> Vec<u32> {
    let Some(raw) = non_empty(lookup, key) else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<u32>() {
            Ok(id) => Some(id),
            Err(_) => {
                error!("Invalid entity id in {key}: {s}, skipping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    const FULL: &[(&str, &str)] = &[
        ("DISCORD_TOKEN", "token"),
        ("ALERT_CHANNEL_ID", "123456789012345678"),
        ("RUST_IP", "203.0.113.7"),
        ("RUST_PORT", "28083"),
        ("STEAM_ID", "76561198000000000"),
        ("PLAYER_TOKEN", "-12345"),
    ];

    #[test]
    fn test_missing_discord_token_is_fatal() {
        let err = load(&[("RUST_IP", "1.2.3.4")]).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn test_blank_discord_token_is_fatal() {
        assert!(load(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_full_config() {
        let cfg = load(FULL).unwrap();
        assert_eq!(cfg.alert_channel_id, Some(123456789012345678));
        assert_eq!(cfg.liveness_port, DEFAULT_LIVENESS_PORT);

        let rust = cfg.rust.expect("telemetry configured");
        assert_eq!(rust.host, "203.0.113.7");
        assert_eq!(rust.port, 28083);
        assert_eq!(rust.player_id, 76561198000000000);
        assert_eq!(rust.player_token, -12345);
        assert_eq!(rust.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_chat_only_when_rust_fields_missing() {
        let cfg = load(&[("DISCORD_TOKEN", "token")]).unwrap();
        assert!(cfg.rust.is_none());
        assert!(cfg.alert_channel_id.is_none());
    }

    #[test]
    fn test_rust_port_defaults() {
        let pairs: Vec<_> = FULL.iter().copied().filter(|(k, _)| *k != "RUST_PORT").collect();
        let cfg = load(&pairs).unwrap();
        assert_eq!(cfg.rust.unwrap().port, DEFAULT_COMPANION_PORT);
    }

    #[test]
    fn test_malformed_numbers_disable_subsystem() {
        let mut pairs: Vec<_> = FULL.to_vec();
        pairs.retain(|(k, _)| *k != "STEAM_ID" && *k != "ALERT_CHANNEL_ID");
        pairs.push(("STEAM_ID", "not-a-number"));
        pairs.push(("ALERT_CHANNEL_ID", "general"));

        let cfg = load(&pairs).unwrap();
        assert!(cfg.rust.is_none());
        assert!(cfg.alert_channel_id.is_none());
    }

    #[test]
    fn test_malformed_rust_port_disables_telemetry() {
        let mut pairs: Vec<_> = FULL.to_vec();
        pairs.retain(|(k, _)| *k != "RUST_PORT");
        pairs.push(("RUST_PORT", "99999"));

        assert!(load(&pairs).unwrap().rust.is_none());
    }

    #[test]
    fn test_zero_channel_id_rejected() {
        let cfg = load(&[("DISCORD_TOKEN", "token"), ("ALERT_CHANNEL_ID", "0")]).unwrap();
        assert!(cfg.alert_channel_id.is_none());
    }

    #[test]
    fn test_watched_entities_and_timeouts() {
        let mut pairs: Vec<_> = FULL.to_vec();
        pairs.push(("WATCHED_ENTITY_IDS", "101, 202,,oops,303"));
        pairs.push(("RUST_REQUEST_TIMEOUT_SECS", "3"));
        pairs.push(("PORT", "9000"));

        let cfg = load(&pairs).unwrap();
        assert_eq!(cfg.liveness_port, 9000);
        let rust = cfg.rust.unwrap();
        assert_eq!(rust.watched_entities, vec![101, 202, 303]);
        assert_eq!(rust.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = load(FULL).unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("\"token\""));
        assert!(printed.contains("<redacted>"));
    }
}
