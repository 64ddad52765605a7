//! Rust+ companion socket client
//!
//! One websocket per client. Requests carry a per-client sequence number and
//! are completed by the response with the same `seq`; entity broadcasts are
//! translated into [`DeviceEvent`]s and fanned out to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use prost::Message as _;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::proto::{AppBroadcast, AppEmpty, AppInfo, AppMessage, AppRequest, AppResponse};
use super::{TelemetryClient, TelemetryError};
use crate::models::{DeviceEvent, ServerStatus};

/// Default companion port (game port + 67)
pub const DEFAULT_COMPANION_PORT: u16 = 28082;

const EVENT_BUFFER: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u32, oneshot::Sender<AppResponse>>>>;

/// Connection settings for a Rust+ server
#[derive(Clone, Debug)]
pub struct RustPlusSettings {
    pub host: String,
    pub port: u16,
    /// Steam id of the paired player
    pub player_id: u64,
    /// Pairing token issued by the server
    pub player_token: i32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Entities to register for change broadcasts after connecting
    pub watched_entities: Vec<u32>,
}

impl RustPlusSettings {
    pub fn new(host: impl Into<String>, port: u16, player_id: u64, player_token: i32) -> Self {
        Self {
            host: host.into(),
            port,
            player_id,
            player_token,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            watched_entities: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

pub struct RustPlusClient {
    settings: RustPlusSettings,
    seq: AtomicU32,
    connected: Arc<AtomicBool>,
    pending: PendingMap,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    events: broadcast::Sender<DeviceEvent>,
}

impl RustPlusClient {
    pub fn new(settings: RustPlusSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            settings,
            seq: AtomicU32::new(0),
            connected: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound: Mutex::new(None),
            events,
        }
    }

    pub fn settings(&self) -> &RustPlusSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn new_request(&self) -> AppRequest {
        AppRequest {
            seq: self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1),
            player_id: self.settings.player_id,
            player_token: self.settings.player_token,
            ..Default::default()
        }
    }

    async fn send_request(&self, request: AppRequest) -> Result<AppResponse, TelemetryError> {
        let tx = self
            .outbound
            .lock()
            .clone()
            .ok_or(TelemetryError::Disconnected)?;

        let seq = request.seq;
        let (resp_tx, resp_rx) = oneshot::channel();
        self.pending.lock().insert(seq, resp_tx);

        // Reader clears `connected` before draining pending, so checking after
        // the insert cannot miss a close.
        if !self.is_connected() || tx.send(Message::Binary(request.encode_to_vec())).is_err() {
            self.pending.lock().remove(&seq);
            return Err(TelemetryError::Disconnected);
        }

        let response = match tokio::time::timeout(self.settings.request_timeout, resp_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(TelemetryError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&seq);
                return Err(TelemetryError::Timeout);
            }
        };

        if let Some(err) = response.error {
            return Err(TelemetryError::Server(err.error));
        }
        Ok(response)
    }

    /// Register an entity so the server broadcasts its changes.
    pub async fn watch_entity(&self, entity_id: u32) -> Result<(), TelemetryError> {
        let mut request = self.new_request();
        request.entity_id = Some(entity_id);
        request.get_entity_info = Some(AppEmpty {});

        let response = self.send_request(request).await?;
        let info = response.entity_info.ok_or_else(|| {
            TelemetryError::Malformed(format!("no entity info for entity {entity_id}"))
        })?;
        debug!(
            "Watching entity {} (current value={:?})",
            entity_id, info.payload.value
        );
        Ok(())
    }
}

#[async_trait]
impl TelemetryClient for RustPlusClient {
    async fn connect(&self) -> Result<(), TelemetryError> {
        if self.is_connected() {
            return Ok(());
        }

        let url = self.settings.url();
        let connecting = connect_async(url.as_str());
        let (socket, _) = tokio::time::timeout(self.settings.connect_timeout, connecting)
            .await
            .map_err(|_| TelemetryError::Connect(format!("timed out connecting to {url}")))?
            .map_err(|e| TelemetryError::Connect(format!("{url}: {e}")))?;

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    warn!("Rust+ socket write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let connected = self.connected.clone();
        let pending = self.pending.clone();
        let events = self.events.clone();
        connected.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Binary(bytes)) => route_frame(&bytes, &pending, &events),
                    Ok(Message::Close(reason)) => {
                        info!("Rust+ server closed the socket: {:?}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Rust+ socket read failed: {}", e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            // Dropping the senders fails every in-flight request with Disconnected
            pending.lock().clear();
        });

        *self.outbound.lock() = Some(tx);
        info!("Connected to Rust+ server at {}", url);

        for entity_id in &self.settings.watched_entities {
            if let Err(e) = self.watch_entity(*entity_id).await {
                warn!("Failed to watch entity {}: {}", entity_id, e);
            }
        }

        Ok(())
    }

    async fn server_status(&self) -> Result<ServerStatus, TelemetryError> {
        let mut request = self.new_request();
        request.get_info = Some(AppEmpty {});

        let response = self.send_request(request).await?;
        let info = response.info.ok_or_else(|| {
            TelemetryError::Malformed("response carried no server info".to_string())
        })?;
        Ok(status_from_info(info))
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}

/// Hand a decoded frame to the waiting request or to event subscribers.
fn route_frame(bytes: &[u8], pending: &PendingMap, events: &broadcast::Sender<DeviceEvent>) {
    let message = match AppMessage::decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            warn!("Skipping undecodable Rust+ frame ({} bytes): {}", bytes.len(), e);
            return;
        }
    };

    if let Some(response) = message.response {
        match pending.lock().remove(&response.seq) {
            Some(waiter) => {
                let _ = waiter.send(response);
            }
            None => debug!("Dropping response for unknown seq {}", response.seq),
        }
    }

    if let Some(event) = message.broadcast.as_ref().and_then(device_event_from_broadcast) {
        debug!("Entity {} changed (active={})", event.entity_id, event.active);
        // No subscribers is not an error
        let _ = events.send(event);
    }
}

fn device_event_from_broadcast(broadcast: &AppBroadcast) -> Option<DeviceEvent> {
    broadcast.entity_changed.as_ref().map(|changed| {
        DeviceEvent::new(changed.entity_id, changed.payload.value.unwrap_or(false))
    })
}

fn status_from_info(info: AppInfo) -> ServerStatus {
    ServerStatus {
        name: info.name,
        player_count: info.players,
        max_players: info.max_players,
        queued_players: info.queued_players,
    }
}
