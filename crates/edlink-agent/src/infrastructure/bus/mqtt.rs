//! MQTT transport built on `rumqttc`.
//!
//! `rumqttc` splits a connection into an [`AsyncClient`] (cheap handle that
//! queues requests) and an [`EventLoop`] (drives the socket, reconnects on
//! the next poll after a failure).  edlink maps them onto its two ports:
//!
//! ```text
//!   dispatch loop ──► MqttTransport (AsyncClient) ──┐
//!                                                   ├─► broker
//!   CommandRouter ◄── MqttInbound (EventLoop) ◄─────┘
//! ```
//!
//! The `connected` flag is shared by both halves: set on a successful
//! ConnAck, cleared on disconnect or any connection error.  Command topics
//! are resubscribed on every ConnAck because the session is clean.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS,
};
use tracing::{debug, info, warn};

use crate::application::publish_queue::{BusTransport, PublishError};
use crate::application::route_command::CommandRouter;
use crate::infrastructure::storage::config::AppConfig;

/// Capacity of the client → event loop request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Pause after a connection error before the next reconnect attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How often a pending event-loop poll rechecks the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// `(username, password)`; `None` connects anonymously.
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    pub qos: QoS,
    pub retain: bool,
    /// Command topics subscribed on every ConnAck.
    pub subscriptions: Vec<String>,
}

impl MqttSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let mqtt = &config.mqtt;
        let credentials = (!mqtt.username.is_empty())
            .then(|| (mqtt.username.clone(), mqtt.password.clone()));
        Self {
            host: mqtt.broker.clone(),
            port: mqtt.port,
            client_id: config.session_client_id(),
            credentials,
            keep_alive: Duration::from_secs(mqtt.keep_alive_secs),
            qos: qos_from_level(mqtt.qos),
            retain: mqtt.retain,
            subscriptions: config.command_subscriptions(),
        }
    }
}

/// Maps a numeric QoS level; values above 2 are capped.
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Creates both halves of a broker connection.  No network I/O happens until
/// [`MqttInbound::run`] starts polling.
pub fn connect(settings: &MqttSettings) -> (MqttTransport, MqttInbound) {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);
    options.set_clean_session(true);
    if let Some((user, pass)) = &settings.credentials {
        options.set_credentials(user, pass);
    }

    let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
    let connected = Arc::new(AtomicBool::new(false));

    let transport = MqttTransport {
        client: client.clone(),
        connected: Arc::clone(&connected),
        qos: settings.qos,
        retain: settings.retain,
    };
    let inbound = MqttInbound {
        eventloop,
        client,
        connected,
        subscriptions: settings.subscriptions.clone(),
        qos: settings.qos,
        broker: format!("{}:{}", settings.host, settings.port),
    };
    (transport, inbound)
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Outbound half: implements [`BusTransport`].
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    qos: QoS,
    retain: bool,
}

impl MqttTransport {
    /// Asks the broker session to close.
    pub fn disconnect(&self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("mqtt disconnect request failed: {e}");
        }
    }
}

#[async_trait]
impl BusTransport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Disconnected);
        }
        self.client
            .publish(topic, self.qos, self.retain, payload.as_bytes().to_vec())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// A command message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Inbound half: owns the event loop and feeds the command router.
pub struct MqttInbound {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    subscriptions: Vec<String>,
    qos: QoS,
    broker: String,
}

impl MqttInbound {
    /// Drives the connection until `running` is cleared.
    ///
    /// A pending poll is only abandoned at shutdown; a slow connect or
    /// handshake is never cut short by the stop-flag check.
    ///
    /// Each inbound publish is handed to a blocking task running
    /// [`CommandRouter::handle`], since a key press sleeps for its hold time.
    pub async fn run(mut self, router: Arc<CommandRouter>, running: Arc<AtomicBool>) {
        info!(broker = %self.broker, "connecting to MQTT broker");
        loop {
            let polled = tokio::select! {
                polled = self.eventloop.poll() => polled,
                () = stop_requested(&running) => break,
            };

            match polled {
                Ok(event) => {
                    if let Some(command) = self.handle_event(event) {
                        let router = Arc::clone(&router);
                        tokio::task::spawn_blocking(move || {
                            router.handle(&command.topic, &command.payload)
                        });
                    }
                }
                Err(e) => {
                    if self.connected.swap(false, Ordering::Relaxed) {
                        warn!(broker = %self.broker, "MQTT connection lost: {e}");
                    } else {
                        debug!(broker = %self.broker, "MQTT connect failed: {e}");
                    }
                    tokio::select! {
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                        () = stop_requested(&running) => break,
                    }
                }
            }
        }
        self.connected.store(false, Ordering::Relaxed);
        debug!("MQTT event loop stopped");
    }

    /// Updates connection state for one event and extracts inbound commands.
    pub fn handle_event(&self, event: Event) -> Option<InboundCommand> {
        match event {
            Event::Incoming(Incoming::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    self.connected.store(true, Ordering::Relaxed);
                    info!(broker = %self.broker, "MQTT connected");
                    self.subscribe_commands();
                } else {
                    self.connected.store(false, Ordering::Relaxed);
                    warn!(broker = %self.broker, code = ?ack.code, "MQTT connection refused");
                }
                None
            }
            Event::Incoming(Incoming::Publish(publish)) => Some(InboundCommand {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Event::Incoming(Incoming::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => {
                self.connected.store(false, Ordering::Relaxed);
                info!(broker = %self.broker, "MQTT disconnected");
                None
            }
            _ => None,
        }
    }

    fn subscribe_commands(&self) {
        for topic in &self.subscriptions {
            match self.client.try_subscribe(topic.as_str(), self.qos) {
                Ok(()) => info!(topic = %topic, "subscribed"),
                Err(e) => warn!(topic = %topic, "subscribe failed: {e}"),
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Resolves once `running` has been cleared.
async fn stop_requested(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(STOP_CHECK_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::route_command::RouterSettings;
    use crate::infrastructure::input_emulation::headless::HeadlessInput;
    use edlink_core::Keymap;
    use rumqttc::{ConnAck, Publish};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn settings() -> MqttSettings {
        MqttSettings {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "edlink-test".to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(30),
            qos: QoS::AtMostOnce,
            retain: false,
            subscriptions: vec!["elite/cmd/#".to_string()],
        }
    }

    fn conn_ack(code: ConnectReturnCode) -> Event {
        Event::Incoming(Incoming::ConnAck(ConnAck {
            session_present: false,
            code,
        }))
    }

    #[test]
    fn test_settings_from_config() {
        // Arrange
        let mut config = AppConfig::default();
        config.mqtt.username = "cmdr".to_string();
        config.mqtt.password = "secret".to_string();
        config.mqtt.qos = 1;
        config.mqtt.cmd_topic = "panel/#".to_string();

        // Act
        let settings = MqttSettings::from_config(&config);

        // Assert
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 1883);
        assert!(settings.client_id.starts_with("elite-parser-"));
        assert_eq!(
            settings.credentials,
            Some(("cmdr".to_string(), "secret".to_string()))
        );
        assert_eq!(settings.qos, QoS::AtLeastOnce);
        assert_eq!(settings.keep_alive, Duration::from_secs(30));
        assert_eq!(settings.subscriptions, vec!["elite/cmd/#", "panel/#"]);
    }

    #[test]
    fn test_anonymous_when_username_empty() {
        let settings = MqttSettings::from_config(&AppConfig::default());
        assert_eq!(settings.credentials, None);
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos_from_level(0), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_connack_and_disconnect_drive_connected_flag() {
        // Arrange
        let (transport, inbound) = connect(&settings());
        assert!(!transport.is_connected());

        // Act / Assert
        inbound.handle_event(conn_ack(ConnectReturnCode::Success));
        assert!(transport.is_connected());

        inbound.handle_event(Event::Incoming(Incoming::Disconnect));
        assert!(!transport.is_connected());

        inbound.handle_event(conn_ack(ConnectReturnCode::NotAuthorized));
        assert!(!inbound.is_connected());
    }

    #[tokio::test]
    async fn test_inbound_publish_becomes_command() {
        let (_transport, inbound) = connect(&settings());
        let publish = Publish::new("elite/cmd/lights", QoS::AtMostOnce, "toggle");

        let command = inbound.handle_event(Event::Incoming(Incoming::Publish(publish)));

        assert_eq!(
            command,
            Some(InboundCommand {
                topic: "elite/cmd/lights".to_string(),
                payload: b"toggle".to_vec(),
            })
        );
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_is_refused() {
        let (transport, _inbound) = connect(&settings());

        let result = transport.publish("elite/events/Docked", "{}").await;

        assert!(matches!(result, Err(PublishError::Disconnected)));
    }

    #[tokio::test]
    async fn test_slow_handshake_is_not_abandoned() {
        // Arrange: a broker that answers CONNECT well after one stop-flag check
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(STOP_CHECK_INTERVAL * 3).await;
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });
        let (transport, inbound) = connect(&MqttSettings {
            port,
            ..settings()
        });
        let router = Arc::new(CommandRouter::new(
            Keymap::default(),
            Arc::new(HeadlessInput),
            RouterSettings::default(),
        ));
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(inbound.run(router, Arc::clone(&running)));

        // Act
        let mut connected = false;
        for _ in 0..80 {
            if transport.is_connected() {
                connected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        running.store(false, Ordering::Relaxed);
        handle.await.unwrap();
        broker.abort();

        // Assert
        assert!(connected, "handshake slower than the stop check never completed");
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_run_returns_promptly_when_stopped_while_connecting() {
        // Arrange: nothing listens on the port, so every attempt fails
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let (_transport, inbound) = connect(&MqttSettings {
            port,
            ..settings()
        });
        let router = Arc::new(CommandRouter::new(
            Keymap::default(),
            Arc::new(HeadlessInput),
            RouterSettings::default(),
        ));
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(inbound.run(router, Arc::clone(&running)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Act
        running.store(false, Ordering::Relaxed);
        let stopped = tokio::time::timeout(STOP_CHECK_INTERVAL * 3, handle).await;

        // Assert: the reconnect back-off does not delay shutdown
        assert!(stopped.is_ok());
    }
}
