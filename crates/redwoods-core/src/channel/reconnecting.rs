use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Connector, WsConnector};

// ============================================================================
// Constants
// ============================================================================

/// Default channel address.
const DEFAULT_URL: &str = "ws://localhost:8080";

/// Reconnect attempts after an unexpected close.
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay between reconnect attempts, in milliseconds.
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    /// Connect as soon as the channel is constructed.
    pub auto_connect: bool,
    pub reconnect_attempts: u32,
    pub reconnect_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auto_connect: true,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
        }
    }
}

/// Observable connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub connected: bool,
    pub connecting: bool,
    pub error: Option<String>,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempt: u32,
}

type Callback = Arc<dyn Fn(Value) + Send + Sync>;

struct Shared {
    state: watch::Sender<ChannelState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_subscriber: AtomicU64,
}

impl Shared {
    fn set_outbound(&self, outbound: Option<mpsc::UnboundedSender<String>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = outbound;
    }

    fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to parse channel message");
                return;
            }
        };

        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(value.clone());
        }
    }
}

/// Keeps a subscriber registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

/// A duplex message channel that reconnects on unexpected closure.
pub struct ReconnectingChannel {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectingChannel {
    /// Create a channel over `connector`.
    ///
    /// With `auto_connect` this connects immediately and must be called
    /// inside a tokio runtime.
    pub fn new(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ChannelState::default());
        let channel = Self {
            config,
            connector,
            shared: Arc::new(Shared {
                state,
                outbound: Mutex::new(None),
                subscribers: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(0),
            }),
            supervisor: Mutex::new(None),
        };
        if channel.config.auto_connect {
            channel.connect();
        }
        channel
    }

    /// A WebSocket channel.
    pub fn websocket(config: ChannelConfig) -> Self {
        Self::new(config, Arc::new(WsConnector))
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Start connecting in the background. Returns immediately; a no-op
    /// while a connection (or reconnect cycle) is already running.
    pub fn connect(&self) {
        let mut supervisor = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *supervisor = Some(tokio::spawn(supervise(
            self.config.clone(),
            self.connector.clone(),
            self.shared.clone(),
        )));
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.shared.set_outbound(None);
        self.shared.state.send_replace(ChannelState::default());
    }

    /// Send `payload` as JSON if the channel is open right now.
    ///
    /// Returns whether it was handed to the connection; nothing is queued
    /// while disconnected.
    pub fn send<T: Serialize>(&self, payload: &T) -> bool {
        let outbound = self.shared.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = outbound.as_ref() else {
            return false;
        };
        match serde_json::to_string(payload) {
            Ok(json) => sender.send(json).is_ok(),
            Err(e) => {
                warn!(error = %e, "Failed to encode channel payload");
                false
            }
        }
    }

    /// Register a callback for every inbound message that parses as JSON.
    ///
    /// Subscriptions survive reconnects.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.borrow().connected
    }

    pub fn watch(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }
}

impl Drop for ReconnectingChannel {
    fn drop(&mut self) {
        let handle = self
            .supervisor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Connect, pump, and reconnect until the attempt budget runs out.
async fn supervise(config: ChannelConfig, connector: Arc<dyn Connector>, shared: Arc<Shared>) {
    let mut attempt: u32 = 0;

    loop {
        shared.state.send_modify(|s| {
            s.connecting = true;
            s.error = None;
        });

        match connector.connect(&config.url).await {
            Ok(connection) => {
                attempt = 0;
                shared.set_outbound(Some(connection.outbound));
                shared.state.send_replace(ChannelState {
                    connected: true,
                    connecting: false,
                    error: None,
                    reconnect_attempt: 0,
                });
                info!(url = %config.url, "Channel connected");

                let mut inbound = connection.inbound;
                while let Some(text) = inbound.recv().await {
                    shared.dispatch(&text);
                }

                shared.set_outbound(None);
                shared.state.send_modify(|s| {
                    s.connected = false;
                    s.connecting = false;
                });
                debug!(url = %config.url, "Channel closed");
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "Channel connection failed");
                shared.state.send_modify(|s| {
                    s.connected = false;
                    s.connecting = false;
                    s.error = Some(e.to_string());
                });
            }
        }

        if attempt >= config.reconnect_attempts {
            warn!(attempts = attempt, "Giving up on channel reconnection");
            break;
        }
        attempt += 1;
        shared.state.send_modify(|s| s.reconnect_attempt = attempt);
        debug!(
            attempt,
            delay_ms = config.reconnect_interval.as_millis() as u64,
            "Scheduling channel reconnect"
        );
        tokio::time::sleep(config.reconnect_interval).await;
    }
}
