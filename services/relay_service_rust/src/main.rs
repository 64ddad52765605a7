use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use raidbell_core::chat::ChatSink;
use raidbell_core::telemetry::{RustPlusClient, TelemetryClient};
use relay_service_rust::config::Config;
use relay_service_rust::discord::{self, DiscordHandler, DiscordSink};
use relay_service_rust::liveness;
use relay_service_rust::relay::{spawn_device_pump, Relay, RelayEvent};
use serenity::Client;
use std::sync::Arc;
use tokio::sync::mpsc;

const EVENT_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    info!("Starting raid alert relay...");

    let cfg = Config::from_env()?;
    info!(
        "Config: alert_channel={:?} rust={:?} liveness_port={}",
        cfg.alert_channel_id,
        cfg.rust.as_ref().map(|r| r.url()),
        cfg.liveness_port,
    );

    if let Err(e) = liveness::spawn(cfg.liveness_port) {
        warn!("Could not start liveness thread: {}", e);
    }

    let (queue_tx, mut queue_rx) = mpsc::channel::<RelayEvent>(EVENT_QUEUE);

    let telemetry: Option<Arc<dyn TelemetryClient>> = cfg.rust.clone().map(|settings| {
        Arc::new(RustPlusClient::new(settings)) as Arc<dyn TelemetryClient>
    });
    if let Some(telemetry) = &telemetry {
        spawn_device_pump(telemetry.subscribe(), queue_tx.clone());
    }

    let mut client = Client::builder(&cfg.discord_token, discord::gateway_intents())
        .event_handler(DiscordHandler::new(queue_tx))
        .await
        .context("Failed to create Discord client")?;

    let chat: Arc<dyn ChatSink> = Arc::new(DiscordSink::new(
        client.http.clone(),
        client.cache.clone(),
    ));
    let relay = Relay::new(telemetry, chat, cfg.alert_channel_id);

    let mut gateway = tokio::spawn(async move { client.start().await });
    info!("Discord client started, relaying events");

    // Handlers run one at a time, in arrival order
    loop {
        tokio::select! {
            Some(event) = queue_rx.recv() => relay.dispatch(event).await,
            result = &mut gateway => {
                return match result {
                    Ok(Ok(())) => {
                        info!("Discord client stopped");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e).context("Discord client failed"),
                    Err(e) => Err(e).context("Discord client task panicked"),
                };
            }
        }
    }
}
